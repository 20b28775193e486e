//! Message broker adapters.
//!
//! Adapters implement the broker and handler ports for different
//! environments:
//!
//! - `RedisStreamBroker` - Redis Streams with consumer groups (production)
//! - `InMemoryMessageBroker` - In-process queues for testing
//! - `QueueConsumer` - Background service running one consume loop
//! - `LoggingEventHandler` - Default handler that logs consumed events

mod in_memory;
mod logging_handler;
mod queue_consumer;
mod redis_stream;

pub use in_memory::InMemoryMessageBroker;
pub use logging_handler::LoggingEventHandler;
pub use queue_consumer::{QueueConsumer, QueueConsumerConfig};
pub use redis_stream::{RedisStreamBroker, RedisStreamConfig};

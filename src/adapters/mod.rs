//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Message broker implementations (Redis Streams, in-memory) and the consumer
//! - `http` - REST API (axum)
//! - `postgres` - PostgreSQL event ledger
//! - `storage` - In-memory event ledger

pub mod events;
pub mod http;
pub mod postgres;
pub mod storage;

pub use events::{
    InMemoryMessageBroker, LoggingEventHandler, QueueConsumer, QueueConsumerConfig,
    RedisStreamBroker, RedisStreamConfig,
};
pub use postgres::PostgresEventLedger;
pub use storage::{InMemoryEventLedger, LedgerFault};

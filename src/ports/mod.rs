//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the relay coordinator and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `EventLedger` - Transactional, idempotent event persistence
//! - `LedgerTransaction` - Caller-scoped transaction on the ledger
//!
//! ## Messaging Ports
//!
//! - `MessageBroker` - Publish to and consume from broker queues
//! - `EventHandler` - Handler invoked for each consumed event

mod event_handler;
mod event_ledger;
mod message_broker;

pub use event_handler::EventHandler;
pub use event_ledger::{EventLedger, LedgerRecord, LedgerTransaction, PersistOutcome, LEDGER_ACTOR};
pub use message_broker::{MessageBroker, PublishAck};

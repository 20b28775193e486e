//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresEventLedger` - Transactional event ledger on `message_event`

mod event_ledger;

pub use event_ledger::PostgresEventLedger;

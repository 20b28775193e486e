//! Storage Adapters
//!
//! In-process implementation of the EventLedger port.
//!
//! - **InMemoryEventLedger** - Stores rows in memory (testing/development)
//!
//! The production ledger lives in `adapters::postgres`.

mod in_memory_ledger;

pub use in_memory_ledger::{InMemoryEventLedger, LedgerFault};

//! Application handlers.
//!
//! Command handlers that orchestrate the ledger and broker ports.

mod relay_event;

pub use relay_event::{RelayEventHandler, RelayOutcome};

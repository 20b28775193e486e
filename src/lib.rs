//! Async Messaging - Event ingestion and relay service
//!
//! Accepts events from producer systems, records each one exactly once in a
//! durable ledger keyed by `(id, origin)`, and forwards first sightings to a
//! message broker. Persist and publish form one unit: a broker failure rolls
//! the ledger write back, and a duplicate is acknowledged without publishing.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (timestamp, errors)
//! - `event` - Inbound event model, wire document and relay errors

pub mod event;
pub mod foundation;

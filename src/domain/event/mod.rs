//! Event domain module.
//!
//! The inbound event model: drafts built at the service edge, accepted
//! events, their opaque payload, lifecycle status, the broker wire document,
//! and relay errors.

mod errors;
#[allow(clippy::module_inception)]
mod event;
mod message;
mod payload;
mod status;

pub use errors::RelayError;
pub use event::{DedupKey, Event, EventDraft, MAX_FIELD_LENGTH};
pub use message::EventMessage;
pub use payload::EventPayload;
pub use status::EventStatus;

//! HTTP adapter for event ingestion.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, PushEventRequest, PushEventResponse};
pub use handlers::{push_event, EventsAppState};
pub use routes::events_routes;

//! HTTP routes for event ingestion.

use axum::{routing::post, Router};

use super::handlers::{push_event, EventsAppState};

/// Creates the events router.
///
/// # Routes
/// - `POST /events` - Persist and publish an inbound event
pub fn events_routes() -> Router<EventsAppState> {
    Router::new().route("/events", post(push_event))
}

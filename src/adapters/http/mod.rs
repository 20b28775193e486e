//! HTTP adapters - REST API implementations.
//!
//! - `events` - `POST /api/events`, the inbound side of the relay
//! - `health` - `GET /api/healthcheck`

pub mod events;
pub mod health;

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use events::{events_routes, EventsAppState};
pub use health::{health_routes, HealthAppState};

/// Builds the complete API router.
///
/// Requests running longer than `request_timeout` are aborted; an aborted
/// relay rolls back like any other cancellation.
pub fn api_router(
    events: EventsAppState,
    health: HealthAppState,
    request_timeout: Duration,
) -> Router {
    let api = Router::new()
        .merge(events_routes().with_state(events))
        .merge(health_routes().with_state(health));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}

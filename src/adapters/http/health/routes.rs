//! HTTP routes for the health check.

use axum::{routing::get, Router};

use super::handlers::{healthcheck, HealthAppState};

/// Creates the health router.
///
/// # Routes
/// - `GET /healthcheck` - Ledger liveness
pub fn health_routes() -> Router<HealthAppState> {
    Router::new().route("/healthcheck", get(healthcheck))
}

//! HTTP handler for the health check.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::ports::EventLedger;

use super::dto::HealthResponse;

#[derive(Clone)]
pub struct HealthAppState {
    ledger: Arc<dyn EventLedger>,
}

impl HealthAppState {
    pub fn new(ledger: Arc<dyn EventLedger>) -> Self {
        Self { ledger }
    }
}

/// GET /api/healthcheck - Report ledger reachability
pub async fn healthcheck(State(state): State<HealthAppState>) -> Response {
    match state.ledger.ping().await {
        Ok(now) => (StatusCode::OK, Json(HealthResponse::up(now.to_rfc3339()))).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::down(e.message)),
            )
                .into_response()
        }
    }
}

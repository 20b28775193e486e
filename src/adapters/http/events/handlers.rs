//! HTTP handlers for event ingestion.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::application::RelayEventHandler;
use crate::domain::event::RelayError;
use crate::domain::foundation::ErrorCode;

use super::dto::{ErrorResponse, PushEventRequest, PushEventResponse};

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

/// In-flight requests are not cancelled on shutdown; the server drains them.
#[derive(Clone)]
pub struct EventsAppState {
    relay: Arc<RelayEventHandler>,
}

impl EventsAppState {
    pub fn new(relay: Arc<RelayEventHandler>) -> Self {
        Self { relay }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// POST /api/events - Persist and publish an inbound event
pub async fn push_event(
    State(state): State<EventsAppState>,
    body: Result<Json<PushEventRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(rejection.body_text())),
            )
                .into_response()
        }
    };

    let draft = match request.into_draft() {
        Ok(draft) => draft,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, Json(ErrorResponse::validation(&e))).into_response()
        }
    };

    // Cancelled if this request future is dropped (client gone, timeout).
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    match state.relay.handle(draft, &cancel).await {
        Ok(outcome) => (StatusCode::OK, Json(PushEventResponse::from(&outcome))).into_response(),
        Err(e) => handle_relay_error(e),
    }
}

fn handle_relay_error(error: RelayError) -> Response {
    let status = match &error {
        RelayError::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
        RelayError::Publish { source, .. } if source.code == ErrorCode::Cancelled => {
            StatusCode::GATEWAY_TIMEOUT
        }
        RelayError::Storage { .. } | RelayError::Publish { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = if status == StatusCode::GATEWAY_TIMEOUT {
        ErrorResponse::timeout(error.message())
    } else {
        ErrorResponse::unavailable(error.code().to_string(), error.message())
    };

    (status, Json(body)).into_response()
}

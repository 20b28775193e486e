//! Request and response DTOs for the event ingestion endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::application::RelayOutcome;
use crate::domain::event::{EventDraft, EventPayload};
use crate::domain::foundation::{ErrorCode, ValidationError};

// ════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════

/// Body of `POST /api/events`.
///
/// `payload` may be any JSON value, `null` included; its bytes are kept
/// exactly as sent. Only a missing key means an empty payload.
#[derive(Debug, Deserialize)]
pub struct PushEventRequest {
    pub event_id: String,
    pub event_origin: String,
    #[serde(default)]
    pub event_destiny: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default, deserialize_with = "present_raw_value")]
    pub payload: Option<Box<RawValue>>,
}

fn present_raw_value<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

impl PushEventRequest {
    /// Validates the request into a draft for the relay.
    pub fn into_draft(self) -> Result<EventDraft, ValidationError> {
        let payload = self
            .payload
            .map(|raw| EventPayload::from_json_str(raw.get()))
            .unwrap_or_default();

        EventDraft::new(
            self.event_id,
            self.event_origin,
            self.event_destiny,
            self.event_type,
            payload,
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════

/// Body of a successful ingestion.
#[derive(Debug, Serialize, Deserialize)]
pub struct PushEventResponse {
    pub message: String,
    pub event_id: String,
    pub status: String,
}

impl From<&RelayOutcome> for PushEventResponse {
    fn from(outcome: &RelayOutcome) -> Self {
        let message = if outcome.is_duplicate() {
            "Event already received"
        } else {
            "Event queued successfully"
        };

        Self {
            message: message.to_string(),
            event_id: outcome.key().id().to_string(),
            status: outcome.status().as_str().to_string(),
        }
    }
}

/// Standard error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn validation(err: &ValidationError) -> Self {
        Self {
            details: Some(serde_json::json!({ "field": err.field() })),
            ..Self::new(ErrorCode::ValidationFailed.to_string(), err.to_string())
        }
    }

    pub fn unavailable(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(code, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("TIMEOUT", message)
    }

    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

//! Broker wire document for relayed events.
//!
//! One JSON object per message carrying every [`Event`] field plus the
//! `timestamp` at which it was handed to the broker. The payload travels as
//! standard base64 so arbitrary bytes survive the JSON encoding unchanged.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};

use super::{DedupKey, Event, EventPayload, EventStatus};

/// Serialized form of an event on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub origin: String,
    pub destiny: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub status: EventStatus,
    pub created_at: Timestamp,
    pub timestamp: Timestamp,
}

impl EventMessage {
    /// Builds the wire document for an event published at `timestamp`.
    pub fn from_event(event: &Event, timestamp: Timestamp) -> Self {
        Self {
            id: event.id().to_string(),
            origin: event.origin().to_string(),
            destiny: event.destiny().to_string(),
            event_type: event.event_type().to_string(),
            payload: event.payload().as_bytes().to_vec(),
            status: event.status(),
            created_at: *event.created_at(),
            timestamp,
        }
    }

    /// Rebuilds the event this document was produced from.
    pub fn into_event(self) -> Event {
        Event::reconstitute(
            DedupKey::new(self.id, self.origin),
            self.destiny,
            self.event_type,
            EventPayload::new(self.payload),
            self.status,
            self.created_at,
        )
    }

    /// Encodes the document as JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self).map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Failed to encode event message: {}", e),
            )
        })
    }

    /// Decodes a document received from the broker.
    ///
    /// Documents without an id or origin are rejected: they cannot be
    /// traced back to a ledger row.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DomainError> {
        let message: EventMessage = serde_json::from_slice(bytes).map_err(|e| {
            DomainError::new(
                ErrorCode::SerializationError,
                format!("Failed to decode event message: {}", e),
            )
        })?;

        if message.id.trim().is_empty() || message.origin.trim().is_empty() {
            return Err(DomainError::new(
                ErrorCode::SerializationError,
                "Event message is missing id or origin",
            ));
        }

        Ok(message)
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

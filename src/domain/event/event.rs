//! Event entity and its inbound draft.
//!
//! An inbound request becomes an [`EventDraft`] at the edge of the service.
//! The relay coordinator stamps the draft with its ingestion time, which
//! yields the immutable [`Event`] that is persisted and published.

use std::fmt;

use crate::domain::foundation::{Timestamp, ValidationError};

use super::{EventPayload, EventStatus};

/// Maximum length for identifier-like fields (matches the ledger columns).
pub const MAX_FIELD_LENGTH: usize = 255;

/// Deduplication key: the producer-assigned id scoped by its origin system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    id: String,
    origin: String,
}

impl DedupKey {
    pub fn new(id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin: origin.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.origin, self.id)
    }
}

/// Validated inbound event that has not been accepted yet.
///
/// # Invariants
///
/// - `id` and `origin` are non-blank
/// - `id`, `origin`, `destiny` and `event_type` are at most 255 characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    key: DedupKey,
    destiny: String,
    event_type: String,
    payload: EventPayload,
}

impl EventDraft {
    /// Builds a draft from untrusted input.
    ///
    /// # Errors
    ///
    /// - `EmptyField` if `id` or `origin` is blank
    /// - `TooLong` if any identifier exceeds [`MAX_FIELD_LENGTH`]
    pub fn new(
        id: impl Into<String>,
        origin: impl Into<String>,
        destiny: impl Into<String>,
        event_type: impl Into<String>,
        payload: EventPayload,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        let origin = origin.into();
        let destiny = destiny.into();
        let event_type = event_type.into();

        require_present("event_id", &id)?;
        require_present("event_origin", &origin)?;
        require_length("event_id", &id)?;
        require_length("event_origin", &origin)?;
        require_length("event_destiny", &destiny)?;
        require_length("event_type", &event_type)?;

        Ok(Self {
            key: DedupKey { id, origin },
            destiny,
            event_type,
            payload,
        })
    }

    pub fn key(&self) -> &DedupKey {
        &self.key
    }

    /// Drafts are always pending until the coordinator accepts them.
    pub fn status(&self) -> EventStatus {
        EventStatus::Pending
    }

    /// Accepts the draft at the given ingestion time.
    pub fn receive(self, received_at: Timestamp) -> Event {
        Event {
            key: self.key,
            destiny: self.destiny,
            event_type: self.event_type,
            payload: self.payload,
            status: EventStatus::Received,
            created_at: received_at,
        }
    }
}

fn require_present(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::empty_field(field));
    }
    Ok(())
}

fn require_length(field: &str, value: &str) -> Result<(), ValidationError> {
    let actual = value.chars().count();
    if actual > MAX_FIELD_LENGTH {
        return Err(ValidationError::too_long(field, MAX_FIELD_LENGTH, actual));
    }
    Ok(())
}

/// One accepted inbound occurrence.
///
/// Never mutated after creation. Status changes after acceptance live on the
/// ledger row, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    key: DedupKey,
    destiny: String,
    event_type: String,
    payload: EventPayload,
    status: EventStatus,
    created_at: Timestamp,
}

impl Event {
    /// Reconstitute an event from a wire document or ledger row (no validation).
    pub fn reconstitute(
        key: DedupKey,
        destiny: String,
        event_type: String,
        payload: EventPayload,
        status: EventStatus,
        created_at: Timestamp,
    ) -> Self {
        Self {
            key,
            destiny,
            event_type,
            payload,
            status,
            created_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Producer-assigned identifier.
    pub fn id(&self) -> &str {
        self.key.id()
    }

    /// System that produced the event.
    pub fn origin(&self) -> &str {
        self.key.origin()
    }

    pub fn key(&self) -> &DedupKey {
        &self.key
    }

    /// Intended routing target.
    pub fn destiny(&self) -> &str {
        &self.destiny
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    /// Ingestion time assigned by the coordinator.
    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }
}

//! EventLedger port - Interface for the durable, idempotent event store.
//!
//! The ledger records each accepted event once, keyed by `(id, origin)`.
//! Writes happen inside a transaction opened by the caller so that the
//! relay coordinator can undo a persist when the publish that follows fails.
//!
//! ## Deduplication
//!
//! Uniqueness is enforced by the storage layer (a primary key on
//! `(event_id, origin_system)` with `ON CONFLICT DO NOTHING`), never by
//! application locks. Under any concurrency exactly one transaction observes
//! [`PersistOutcome::Inserted`] for a key; the others observe
//! [`PersistOutcome::Duplicate`].

use async_trait::async_trait;

use crate::domain::event::{DedupKey, Event, EventPayload, EventStatus};
use crate::domain::foundation::{DomainError, Timestamp};

/// Actor recorded in `updated_by` for rows written by the relay.
pub const LEDGER_ACTOR: &str = "SYSTEM";

/// Result of attempting to persist an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Row was inserted (first time seeing this key).
    Inserted,
    /// A row for this key already exists. Not an error.
    Duplicate,
}

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub event_id: String,
    pub origin_system: String,
    pub destiny_system: String,
    pub event_type: String,
    pub payload: EventPayload,
    pub status: EventStatus,
    pub received_at: Timestamp,
    pub updated_by: String,
}

impl LedgerRecord {
    /// Row for a freshly accepted event.
    pub fn received(event: &Event) -> Self {
        Self {
            event_id: event.id().to_string(),
            origin_system: event.origin().to_string(),
            destiny_system: event.destiny().to_string(),
            event_type: event.event_type().to_string(),
            payload: event.payload().clone(),
            status: EventStatus::Received,
            received_at: *event.created_at(),
            updated_by: LEDGER_ACTOR.to_string(),
        }
    }

    pub fn key(&self) -> DedupKey {
        DedupKey::new(self.event_id.clone(), self.origin_system.clone())
    }
}

/// An open ledger transaction.
///
/// Dropping a transaction without calling `commit` rolls it back, so every
/// exit path (errors, panics, a cancelled future) releases it.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Insert the event if its dedup key is absent.
    ///
    /// A dedup conflict is reported as `Duplicate`. Any other failure is a
    /// `DatabaseError` and the transaction must not be committed.
    async fn persist(&mut self, event: &Event) -> Result<PersistOutcome, DomainError>;

    /// Record that the event behind `key` was accepted by the broker.
    async fn mark_published(&mut self, key: &DedupKey) -> Result<(), DomainError>;

    /// Make all writes of this transaction durable.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discard all writes of this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

/// Port for the durable event ledger.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Open a transaction. It must not outlive one relay invocation.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, DomainError>;

    /// Look up a committed row.
    async fn find(&self, key: &DedupKey) -> Result<Option<LedgerRecord>, DomainError>;

    /// Liveness check; returns the store's current time.
    async fn ping(&self) -> Result<Timestamp, DomainError>;
}

//! RelayEventHandler - Persists an inbound event and publishes it as one unit.
//!
//! The ledger transaction stays open across the broker call:
//!
//! ```text
//! begin ─► persist ─┬─ Duplicate ──► commit (no-op) ──► Ok(Duplicate)
//!                   ├─ Err ────────► rollback ────────► Err(Storage)
//!                   └─ Inserted ──► publish ─┬─ Ok ───► mark_published, commit ──► Ok(Published)
//!                                            └─ Err ──► rollback ───────────────► Err(Publish)
//! ```
//!
//! A committed row therefore always has a broker message behind it. The
//! handler never retries; every failure leaves the ledger as it was, so the
//! caller may resubmit the same event.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::event::{DedupKey, Event, EventDraft, EventStatus, RelayError};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{EventLedger, LedgerTransaction, MessageBroker, PersistOutcome, PublishAck};

/// Successful relay results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// First sighting: the event was persisted and accepted by the broker.
    Published { event: Event, ack: PublishAck },
    /// The key was already in the ledger; nothing was written or published.
    Duplicate { key: DedupKey },
}

impl RelayOutcome {
    pub fn key(&self) -> &DedupKey {
        match self {
            RelayOutcome::Published { event, .. } => event.key(),
            RelayOutcome::Duplicate { key } => key,
        }
    }

    pub fn status(&self) -> EventStatus {
        match self {
            RelayOutcome::Published { .. } => EventStatus::Published,
            RelayOutcome::Duplicate { .. } => EventStatus::Duplicate,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, RelayOutcome::Duplicate { .. })
    }
}

/// Handler relaying inbound events to the broker.
pub struct RelayEventHandler {
    ledger: Arc<dyn EventLedger>,
    broker: Arc<dyn MessageBroker>,
}

impl RelayEventHandler {
    pub fn new(ledger: Arc<dyn EventLedger>, broker: Arc<dyn MessageBroker>) -> Self {
        Self { ledger, broker }
    }

    /// Relays one event.
    ///
    /// # Cancellation
    ///
    /// If `cancel` fires before the publish starts nothing is committed and
    /// `RelayError::Cancelled` is returned. If it fires while the publish is
    /// in flight the publish counts as failed and the persist is rolled back.
    /// Dropping the returned future also rolls back.
    pub async fn handle(
        &self,
        draft: EventDraft,
        cancel: &CancellationToken,
    ) -> Result<RelayOutcome, RelayError> {
        let event = draft.receive(Timestamp::now());
        let key = event.key().clone();

        if cancel.is_cancelled() {
            debug!(event_id = %key.id(), origin = %key.origin(), "Relay cancelled before start");
            return Err(RelayError::cancelled(key));
        }

        // 1. Open the transactional scope
        let mut tx = self
            .ledger
            .begin()
            .await
            .map_err(|e| RelayError::storage("begin", key.clone(), e))?;

        // 2. Persist inside it
        let persisted = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tx.persist(&event) => Some(result),
        };

        let outcome = match persisted {
            None => {
                self.discard(tx, &key).await;
                debug!(event_id = %key.id(), origin = %key.origin(), "Relay cancelled during persist");
                return Err(RelayError::cancelled(key));
            }
            Some(Err(e)) => {
                self.discard(tx, &key).await;
                warn!(event_id = %key.id(), origin = %key.origin(), error = %e, "Failed to persist event");
                return Err(RelayError::storage("persist", key, e));
            }
            Some(Ok(outcome)) => outcome,
        };

        if outcome == PersistOutcome::Duplicate {
            tx.commit()
                .await
                .map_err(|e| RelayError::storage("commit", key.clone(), e))?;
            info!(event_id = %key.id(), origin = %key.origin(), "Duplicate event ignored");
            return Ok(RelayOutcome::Duplicate { key });
        }

        debug!(event_id = %key.id(), origin = %key.origin(), "Event persisted");

        if cancel.is_cancelled() {
            self.discard(tx, &key).await;
            debug!(event_id = %key.id(), origin = %key.origin(), "Relay cancelled before publish");
            return Err(RelayError::cancelled(key));
        }

        // 3. Publish while the row is still uncommitted
        let published = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DomainError::new(
                ErrorCode::Cancelled,
                "Publish cancelled before broker confirmation",
            )),
            result = self.broker.publish(&event) => result,
        };

        let ack = match published {
            Ok(ack) => ack,
            Err(e) => {
                self.discard(tx, &key).await;
                warn!(event_id = %key.id(), origin = %key.origin(), error = %e, "Failed to publish event, persist rolled back");
                return Err(RelayError::publish(key, e));
            }
        };

        // 4. Record the publish and make the row durable
        if let Err(e) = tx.mark_published(&key).await {
            self.discard(tx, &key).await;
            warn!(
                event_id = %key.id(),
                origin = %key.origin(),
                message_id = %ack.message_id,
                error = %e,
                "Event published but ledger update failed"
            );
            return Err(RelayError::storage("mark_published", key, e));
        }

        if let Err(e) = tx.commit().await {
            warn!(
                event_id = %key.id(),
                origin = %key.origin(),
                message_id = %ack.message_id,
                error = %e,
                "Event published but ledger commit failed"
            );
            return Err(RelayError::storage("commit", key, e));
        }

        info!(
            event_id = %key.id(),
            origin = %key.origin(),
            queue = %ack.queue,
            message_id = %ack.message_id,
            "Event relayed"
        );

        Ok(RelayOutcome::Published { event, ack })
    }

    /// Rolls back, logging instead of failing: a transaction that cannot be
    /// rolled back explicitly is still rolled back when dropped.
    async fn discard(&self, tx: Box<dyn LedgerTransaction>, key: &DedupKey) {
        if let Err(e) = tx.rollback().await {
            warn!(event_id = %key.id(), origin = %key.origin(), error = %e, "Rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryMessageBroker;
    use crate::adapters::storage::{InMemoryEventLedger, LedgerFault};
    use crate::domain::event::EventPayload;
    use std::time::Duration;

    const QUEUE: &str = "user.events";

    struct Fixture {
        ledger: Arc<InMemoryEventLedger>,
        broker: Arc<InMemoryMessageBroker>,
        handler: RelayEventHandler,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryEventLedger::new());
        let broker = Arc::new(InMemoryMessageBroker::new(QUEUE));
        let handler = RelayEventHandler::new(ledger.clone(), broker.clone());
        Fixture {
            ledger,
            broker,
            handler,
        }
    }

    fn draft(id: &str) -> EventDraft {
        EventDraft::new(
            id,
            "SYS-A",
            "SYS-B",
            "ORDER_CREATED",
            EventPayload::from_json_str(r#"{"amt":100}"#),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn first_relay_persists_and_publishes() {
        let f = fixture();

        let outcome = f
            .handler
            .handle(draft("E1"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.status(), EventStatus::Published);
        assert_eq!(f.ledger.row_count(), 1);
        assert_eq!(f.ledger.records()[0].status, EventStatus::Published);
        assert_eq!(f.broker.published_count(), 1);

        let message = &f.broker.published_messages()[0];
        assert_eq!(message.id, "E1");
        assert_eq!(message.payload, br#"{"amt":100}"#.to_vec());
    }

    #[tokio::test]
    async fn published_event_carries_received_status_and_timestamp() {
        let f = fixture();
        let before = Timestamp::now();

        let outcome = f
            .handler
            .handle(draft("E1"), &CancellationToken::new())
            .await
            .unwrap();

        match outcome {
            RelayOutcome::Published { event, ack } => {
                assert_eq!(event.status(), EventStatus::Received);
                assert!(!event.created_at().is_before(&before));
                assert_eq!(ack.queue, QUEUE);
            }
            other => panic!("expected Published, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn second_relay_is_duplicate_without_publish() {
        let f = fixture();
        let cancel = CancellationToken::new();

        f.handler.handle(draft("E1"), &cancel).await.unwrap();
        let outcome = f.handler.handle(draft("E1"), &cancel).await.unwrap();

        assert!(outcome.is_duplicate());
        assert_eq!(outcome.status(), EventStatus::Duplicate);
        assert_eq!(f.ledger.row_count(), 1);
        assert_eq!(f.broker.published_count(), 1);
    }

    #[tokio::test]
    async fn same_id_from_other_origin_is_not_duplicate() {
        let f = fixture();
        let cancel = CancellationToken::new();

        f.handler.handle(draft("E1"), &cancel).await.unwrap();
        let other = EventDraft::new("E1", "SYS-C", "SYS-B", "ORDER_CREATED", EventPayload::default()).unwrap();
        let outcome = f.handler.handle(other, &cancel).await.unwrap();

        assert!(!outcome.is_duplicate());
        assert_eq!(f.ledger.row_count(), 2);
    }

    #[tokio::test]
    async fn publish_failure_rolls_back_persist() {
        let f = fixture();
        f.broker.fail_publishes("connection refused");

        let err = f
            .handler
            .handle(draft("E2"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Publish { .. }));
        assert_eq!(err.code(), ErrorCode::BrokerError);
        assert_eq!(err.key().id(), "E2");
        assert_eq!(f.ledger.row_count(), 0);
        assert_eq!(f.ledger.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn retry_after_publish_failure_succeeds() {
        let f = fixture();
        let cancel = CancellationToken::new();
        f.broker.fail_publishes("connection refused");
        assert!(f.handler.handle(draft("E2"), &cancel).await.is_err());

        f.broker.heal();
        let outcome = f.handler.handle(draft("E2"), &cancel).await.unwrap();

        assert_eq!(outcome.status(), EventStatus::Published);
        assert_eq!(f.ledger.row_count(), 1);
        assert_eq!(f.broker.published_count(), 1);
    }

    #[tokio::test]
    async fn persist_failure_is_storage_error_without_publish() {
        let f = fixture();
        f.ledger.inject_fault(LedgerFault::Persist);

        let err = f
            .handler
            .handle(draft("E1"), &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            RelayError::Storage { operation, .. } => assert_eq!(*operation, "persist"),
            other => panic!("expected Storage, got {:?}", other),
        }
        assert_eq!(err.code(), ErrorCode::DatabaseError);
        assert!(err.to_string().contains("E1"));
        assert_eq!(f.broker.published_count(), 0);
    }

    #[tokio::test]
    async fn begin_failure_is_storage_error() {
        let f = fixture();
        f.ledger.inject_fault(LedgerFault::Begin);

        let err = f
            .handler
            .handle(draft("E1"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Storage { operation: "begin", .. }));
        assert_eq!(f.broker.published_count(), 0);
    }

    #[tokio::test]
    async fn commit_failure_after_publish_is_storage_error() {
        let f = fixture();
        f.ledger.inject_fault(LedgerFault::Commit);

        let err = f
            .handler
            .handle(draft("E1"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Storage { operation: "commit", .. }));
        assert_eq!(f.ledger.row_count(), 0);
        assert_eq!(f.ledger.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn mark_published_failure_after_publish_is_storage_error() {
        let f = fixture();
        f.ledger.inject_fault(LedgerFault::MarkPublished);

        let err = f
            .handler
            .handle(draft("E1"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RelayError::Storage {
                operation: "mark_published",
                ..
            }
        ));
        assert_eq!(f.ledger.row_count(), 0);
        assert_eq!(f.ledger.in_flight_count(), 0);
        assert_eq!(f.ledger.rollback_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_while_persist_waits_on_key_writes_nothing() {
        let f = fixture();

        // Another transaction holds the key uncommitted.
        let mut holder = f.ledger.begin().await.unwrap();
        holder
            .persist(&draft("E1").receive(Timestamp::now()))
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });

        let err = f.handler.handle(draft("E1"), &cancel).await.unwrap_err();
        assert!(matches!(err, RelayError::Cancelled { .. }));

        holder.rollback().await.unwrap();
        assert_eq!(f.ledger.row_count(), 0);
        assert_eq!(f.ledger.in_flight_count(), 0);
        assert_eq!(f.broker.published_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_before_start_writes_nothing() {
        let f = fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f.handler.handle(draft("E1"), &cancel).await.unwrap_err();

        assert!(matches!(err, RelayError::Cancelled { .. }));
        assert_eq!(err.code(), ErrorCode::Cancelled);
        assert_eq!(f.ledger.row_count(), 0);
        assert_eq!(f.broker.published_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_during_publish_rolls_back() {
        let f = fixture();
        f.broker.delay_publishes(Duration::from_millis(200));
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });

        let err = f.handler.handle(draft("E1"), &cancel).await.unwrap_err();

        assert!(matches!(err, RelayError::Publish { .. }));
        assert_eq!(f.ledger.row_count(), 0);
        assert_eq!(f.ledger.in_flight_count(), 0);
        assert_eq!(f.broker.published_count(), 0);
    }

    #[tokio::test]
    async fn dropped_relay_future_leaves_no_row() {
        let f = fixture();
        f.broker.delay_publishes(Duration::from_millis(200));

        let cancel = CancellationToken::new();
        let result = tokio::time::timeout(
            Duration::from_millis(20),
            f.handler.handle(draft("E1"), &cancel),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(f.ledger.row_count(), 0);
        assert_eq!(f.ledger.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_relays_of_same_event_publish_once() {
        let f = fixture();
        let handler = Arc::new(f.handler);
        f.broker.delay_publishes(Duration::from_millis(10));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move {
                handler.handle(draft("E1"), &CancellationToken::new()).await
            }));
        }

        let mut published = 0;
        let mut duplicates = 0;
        for task in tasks {
            match task.await.unwrap().unwrap() {
                RelayOutcome::Published { .. } => published += 1,
                RelayOutcome::Duplicate { .. } => duplicates += 1,
            }
        }

        assert_eq!(published, 1);
        assert_eq!(duplicates, 7);
        assert_eq!(f.ledger.row_count(), 1);
        assert_eq!(f.broker.published_count(), 1);
    }
}

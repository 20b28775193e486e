//! In-memory message broker for testing.
//!
//! Holds one FIFO queue per name and follows the same delivery rules as the
//! Redis Streams broker: a message is acknowledged only after the handler
//! succeeded, a handler failure leaves it pending for redelivery on the next
//! `consume`, and undecodable messages are logged and dropped.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are poisoned.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::domain::event::{Event, EventMessage};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{EventHandler, MessageBroker, PublishAck};

#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: Vec<u8>,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<StoredMessage>,
    pending: VecDeque<StoredMessage>,
    acked: Vec<String>,
    dropped: Vec<String>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    published: Vec<EventMessage>,
    fail_publish: Option<String>,
    publish_delay: Option<Duration>,
}

/// In-memory broker.
///
/// Features:
/// - Publish capture for assertions
/// - Ack-after-handle consume loop with cancellation
/// - Failure and latency injection for publish
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned. This is acceptable
/// for test code but this adapter should NOT be used in production.
///
/// # Example
///
/// ```ignore
/// let broker = Arc::new(InMemoryMessageBroker::new("user.events"));
///
/// broker.publish(&event).await?;
///
/// assert_eq!(broker.published_count(), 1);
/// assert_eq!(broker.ready_count("user.events"), 1);
/// ```
pub struct InMemoryMessageBroker {
    queue: String,
    state: Mutex<BrokerState>,
    arrived: Notify,
    next_id: AtomicU64,
}

impl InMemoryMessageBroker {
    /// Creates a broker that publishes to `queue`.
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            state: Mutex::new(BrokerState::default()),
            arrived: Notify::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state
            .lock()
            .expect("InMemoryMessageBroker: state lock poisoned")
    }

    fn enqueue(&self, queue: &str, body: Vec<u8>) -> String {
        let id = format!("{}-0", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.state()
            .queues
            .entry(queue.to_string())
            .or_default()
            .ready
            .push_back(StoredMessage {
                id: id.clone(),
                body,
            });
        self.arrived.notify_waiters();
        id
    }

    /// Messages delivered earlier but never acknowledged.
    fn backlog(&self, queue: &str) -> VecDeque<StoredMessage> {
        self.state()
            .queues
            .get(queue)
            .map(|q| q.pending.clone())
            .unwrap_or_default()
    }

    /// Pops the next ready message, moving it to the pending list.
    fn claim(&self, queue: &str) -> Option<StoredMessage> {
        let mut state = self.state();
        let queue_state = state.queues.entry(queue.to_string()).or_default();
        let message = queue_state.ready.pop_front()?;
        queue_state.pending.push_back(message.clone());
        Some(message)
    }

    fn settle(&self, queue: &str, id: &str, dropped: bool) {
        let mut state = self.state();
        let queue_state = state.queues.entry(queue.to_string()).or_default();
        queue_state.pending.retain(|m| m.id != id);
        if dropped {
            queue_state.dropped.push(id.to_string());
        } else {
            queue_state.acked.push(id.to_string());
        }
    }

    // === Test Helpers ===

    /// Makes every publish fail with `reason` until cleared.
    pub fn fail_publishes(&self, reason: impl Into<String>) {
        self.state().fail_publish = Some(reason.into());
    }

    /// Delays every publish by `delay` before it is accepted.
    pub fn delay_publishes(&self, delay: Duration) {
        self.state().publish_delay = Some(delay);
    }

    /// Clears injected failures and delays.
    pub fn heal(&self) {
        let mut state = self.state();
        state.fail_publish = None;
        state.publish_delay = None;
    }

    /// Pushes raw bytes onto a queue, bypassing encoding.
    pub fn push_raw(&self, queue: &str, body: impl Into<Vec<u8>>) -> String {
        self.enqueue(queue, body.into())
    }

    /// Returns all accepted publishes (for test assertions).
    pub fn published_messages(&self) -> Vec<EventMessage> {
        self.state().published.clone()
    }

    pub fn published_count(&self) -> usize {
        self.state().published.len()
    }

    /// Messages not yet delivered to any consumer.
    pub fn ready_count(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Messages delivered but not acknowledged.
    pub fn pending_count(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, |q| q.pending.len())
    }

    pub fn acked_count(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, |q| q.acked.len())
    }

    /// Messages acknowledged without handling because they could not be decoded.
    pub fn dropped_count(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, |q| q.dropped.len())
    }
}

#[async_trait]
impl MessageBroker for InMemoryMessageBroker {
    async fn publish(&self, event: &Event) -> Result<PublishAck, DomainError> {
        let delay = self.state().publish_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.state().fail_publish.clone();
        if let Some(reason) = failure {
            return Err(DomainError::broker(format!(
                "Failed to publish to {}: {}",
                self.queue, reason
            )));
        }

        let message = EventMessage::from_event(event, Timestamp::now());
        let body = message.to_bytes()?;
        self.state().published.push(message);
        let message_id = self.enqueue(&self.queue, body);

        Ok(PublishAck {
            queue: self.queue.clone(),
            message_id,
        })
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn EventHandler>,
        cancel: CancellationToken,
    ) -> Result<(), DomainError> {
        // Redeliver what an earlier consumer left unacknowledged, once.
        let mut backlog = self.backlog(queue);

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }

            // Registered before the queue is checked so a publish landing
            // in between still wakes this loop.
            let arrived = self.arrived.notified();

            let message = match backlog.pop_front().or_else(|| self.claim(queue)) {
                Some(message) => message,
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = arrived => {}
                    }
                    continue;
                }
            };

            let event = match EventMessage::from_slice(&message.body) {
                Ok(decoded) => decoded.into_event(),
                Err(e) => {
                    tracing::warn!(
                        queue = %queue,
                        message_id = %message.id,
                        error = %e,
                        "Discarding undecodable message"
                    );
                    self.settle(queue, &message.id, true);
                    continue;
                }
            };

            let key = event.key().clone();
            match handler.handle(event).await {
                Ok(()) => self.settle(queue, &message.id, false),
                Err(e) => {
                    tracing::warn!(
                        queue = %queue,
                        message_id = %message.id,
                        event = %key,
                        handler = handler.name(),
                        error = %e,
                        "Handler failed, message left pending"
                    );
                }
            }
        }
    }
}

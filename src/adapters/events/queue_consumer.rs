//! QueueConsumer - Long-lived task draining one broker queue.
//!
//! Wraps [`MessageBroker::consume`] with restart handling: if the consume
//! loop fails (connection lost, group missing) the consumer logs, waits and
//! starts it again until shutdown.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `restart_delay` | 1s | Wait before restarting a failed consume loop |
//! | `max_restarts` | unlimited | Give up after this many consecutive failures |
//! | `stable_after` | 60s | A loop that ran this long resets the failure count |
//!
//! ## Graceful Shutdown
//!
//! Cancelling the token stops the consume loop after the message in hand
//! has been handled and acknowledged.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::DomainError;
use crate::ports::{EventHandler, MessageBroker};

/// Configuration for the QueueConsumer service.
#[derive(Debug, Clone)]
pub struct QueueConsumerConfig {
    /// How long to wait before restarting a failed consume loop.
    pub restart_delay: Duration,

    /// Maximum consecutive failures before `run` returns the error.
    pub max_restarts: Option<u32>,

    /// A consume loop that ran at least this long before failing counts as
    /// healthy, so its failure starts a new streak.
    pub stable_after: Duration,
}

impl Default for QueueConsumerConfig {
    fn default() -> Self {
        Self {
            restart_delay: Duration::from_secs(1),
            max_restarts: None,
            stable_after: Duration::from_secs(60),
        }
    }
}

impl QueueConsumerConfig {
    /// Create config with custom restart delay.
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Create config with a restart limit.
    pub fn with_max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = Some(max);
        self
    }

    /// Create config with a custom healthy-run threshold.
    pub fn with_stable_after(mut self, stable_after: Duration) -> Self {
        self.stable_after = stable_after;
        self
    }
}

/// Background service consuming one queue.
pub struct QueueConsumer {
    broker: Arc<dyn MessageBroker>,
    queue: String,
    handler: Arc<dyn EventHandler>,
    config: QueueConsumerConfig,
}

impl QueueConsumer {
    /// Create a new QueueConsumer with default configuration.
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        queue: impl Into<String>,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self::with_config(broker, queue, handler, QueueConsumerConfig::default())
    }

    /// Create a new QueueConsumer with custom configuration.
    pub fn with_config(
        broker: Arc<dyn MessageBroker>,
        queue: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        config: QueueConsumerConfig,
    ) -> Self {
        Self {
            broker,
            queue: queue.into(),
            handler,
            config,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Run until `cancel` fires.
    ///
    /// # Returns
    ///
    /// Returns `Ok(())` on shutdown, or the last error once `max_restarts`
    /// consecutive failures have occurred.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), DomainError> {
        let mut failures: u32 = 0;

        tracing::info!(queue = %self.queue, handler = self.handler.name(), "Consumer started");

        loop {
            let started = Instant::now();
            let result = self
                .broker
                .consume(&self.queue, Arc::clone(&self.handler), cancel.clone())
                .await;

            let error = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if cancel.is_cancelled() {
                return Ok(());
            }

            if started.elapsed() >= self.config.stable_after {
                failures = 0;
            }
            failures += 1;
            if self.config.max_restarts.is_some_and(|max| failures > max) {
                tracing::error!(
                    queue = %self.queue,
                    failures,
                    error = %error,
                    "Consumer giving up"
                );
                return Err(error);
            }

            tracing::warn!(
                queue = %self.queue,
                failures,
                error = %error,
                retry_in_ms = self.config.restart_delay.as_millis() as u64,
                "Consume loop failed, restarting"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = time::sleep(self.config.restart_delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::{InMemoryMessageBroker, LoggingEventHandler};
    use crate::domain::event::{Event, EventDraft, EventPayload};
    use crate::domain::foundation::{ErrorCode, Timestamp};
    use crate::ports::PublishAck;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Broker whose consume loop always fails, after running for `run_for`.
    struct BrokenBroker {
        attempts: AtomicU32,
        run_for: Duration,
    }

    impl BrokenBroker {
        fn new() -> Self {
            Self::running_for(Duration::ZERO)
        }

        fn running_for(run_for: Duration) -> Self {
            Self {
                attempts: AtomicU32::new(0),
                run_for,
            }
        }
    }

    #[async_trait]
    impl MessageBroker for BrokenBroker {
        async fn publish(&self, _event: &Event) -> Result<PublishAck, DomainError> {
            Err(DomainError::broker("down"))
        }

        async fn consume(
            &self,
            _queue: &str,
            _handler: Arc<dyn EventHandler>,
            _cancel: CancellationToken,
        ) -> Result<(), DomainError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            time::sleep(self.run_for).await;
            Err(DomainError::broker("connection reset"))
        }
    }

    fn event(id: &str) -> Event {
        EventDraft::new(id, "SYS-A", "SYS-B", "ORDER_CREATED", EventPayload::default())
            .unwrap()
            .receive(Timestamp::now())
    }

    #[test]
    fn config_builders_override_defaults() {
        let config = QueueConsumerConfig::default()
            .with_restart_delay(Duration::from_millis(5))
            .with_max_restarts(3)
            .with_stable_after(Duration::from_secs(5));

        assert_eq!(config.restart_delay, Duration::from_millis(5));
        assert_eq!(config.max_restarts, Some(3));
        assert_eq!(config.stable_after, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn run_drains_queue_and_stops_on_cancel() {
        let broker = Arc::new(InMemoryMessageBroker::new("user.events"));
        broker.publish(&event("E1")).await.unwrap();
        broker.publish(&event("E2")).await.unwrap();

        let consumer = QueueConsumer::new(broker.clone(), "user.events", Arc::new(LoggingEventHandler));
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });

        consumer.run(cancel).await.unwrap();

        assert_eq!(broker.acked_count("user.events"), 2);
        assert_eq!(broker.pending_count("user.events"), 0);
    }

    #[tokio::test]
    async fn run_gives_up_after_max_restarts() {
        let broker = Arc::new(BrokenBroker::new());
        let config = QueueConsumerConfig::default()
            .with_restart_delay(Duration::from_millis(1))
            .with_max_restarts(2);
        let consumer = QueueConsumer::with_config(
            broker.clone(),
            "user.events",
            Arc::new(LoggingEventHandler),
            config,
        );

        let err = consumer.run(CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::BrokerError);
        assert_eq!(broker.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancel_during_restart_delay_returns_ok() {
        let broker = Arc::new(BrokenBroker::new());
        let config = QueueConsumerConfig::default().with_restart_delay(Duration::from_secs(60));
        let consumer =
            QueueConsumer::with_config(broker, "user.events", Arc::new(LoggingEventHandler), config);

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(20)).await;
            stopper.cancel();
        });

        assert!(consumer.run(cancel).await.is_ok());
    }

    #[tokio::test]
    async fn long_running_loops_reset_the_failure_count() {
        let broker = Arc::new(BrokenBroker::running_for(Duration::from_millis(20)));
        let config = QueueConsumerConfig::default()
            .with_restart_delay(Duration::from_millis(1))
            .with_max_restarts(1)
            .with_stable_after(Duration::from_millis(10));
        let consumer = QueueConsumer::with_config(
            broker.clone(),
            "user.events",
            Arc::new(LoggingEventHandler),
            config,
        );

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(150)).await;
            stopper.cancel();
        });

        assert!(consumer.run(cancel).await.is_ok());
        assert!(broker.attempts.load(Ordering::SeqCst) > 2);
    }
}

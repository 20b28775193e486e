//! Redis Streams message broker for production deployments.
//!
//! Each queue is a stream. Publishing is `XADD` with an approximate length
//! cap; the entry id Redis returns is the publish confirmation. Consuming
//! goes through a consumer group so that several service instances share a
//! queue and unacknowledged entries survive restarts:
//!
//! 1. `XGROUP CREATE <queue> <group> 0 MKSTREAM` (an existing group is fine)
//! 2. Re-read this consumer's pending entries (`XREADGROUP ... 0`)
//! 3. Read new entries one at a time (`XREADGROUP ... BLOCK <ms> ... >`)
//! 4. `XACK` only after the handler returned `Ok`
//!
//! The blocking read returns every `block_ms`, which is when cancellation
//! is observed. An entry is never read and then abandoned.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio_util::sync::CancellationToken;

use crate::domain::event::{Event, EventMessage};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{EventHandler, MessageBroker, PublishAck};

/// Field of a stream entry holding the encoded [`EventMessage`].
const BODY_FIELD: &str = "body";

/// Read cursor that returns this consumer's pending entries.
const PENDING_CURSOR: &str = "0";

/// Read cursor that returns entries never delivered to the group.
const NEW_ENTRIES: &str = ">";

/// Settings for [`RedisStreamBroker`].
#[derive(Debug, Clone)]
pub struct RedisStreamConfig {
    /// Stream that `publish` writes to.
    pub queue: String,
    pub consumer_group: String,
    /// Name of this instance within the group.
    pub consumer_name: String,
    /// How long one blocking read waits for new entries.
    pub block_ms: usize,
    /// Approximate cap on stream length.
    pub max_len: usize,
}

impl Default for RedisStreamConfig {
    fn default() -> Self {
        Self {
            queue: "user.events".to_string(),
            consumer_group: "async-messaging".to_string(),
            consumer_name: "async-messaging-1".to_string(),
            block_ms: 1000,
            max_len: 100_000,
        }
    }
}

/// Redis Streams broker.
#[derive(Clone)]
pub struct RedisStreamBroker {
    client: redis::Client,
    conn: MultiplexedConnection,
    config: RedisStreamConfig,
}

impl RedisStreamBroker {
    /// Create a broker from an open publishing connection.
    ///
    /// `client` is used to open a dedicated connection per `consume` call.
    pub fn new(client: redis::Client, conn: MultiplexedConnection, config: RedisStreamConfig) -> Self {
        Self {
            client,
            conn,
            config,
        }
    }

    /// Connect to `url` and create a broker.
    pub async fn connect(url: &str, config: RedisStreamConfig) -> Result<Self, DomainError> {
        let client = redis::Client::open(url)
            .map_err(|e| DomainError::broker(format!("Invalid Redis URL: {}", e)))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| DomainError::broker(format!("Failed to connect to Redis: {}", e)))?;
        Ok(Self::new(client, conn, config))
    }

    pub fn config(&self) -> &RedisStreamConfig {
        &self.config
    }

    async fn ensure_group(
        &self,
        conn: &mut MultiplexedConnection,
        queue: &str,
    ) -> Result<(), DomainError> {
        let created: Result<(), redis::RedisError> = conn
            .xgroup_create_mkstream(queue, &self.config.consumer_group, "0")
            .await;

        match created {
            Ok(()) => {
                tracing::info!(
                    queue = %queue,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(DomainError::broker(format!(
                "Failed to create consumer group {} on {}: {}",
                self.config.consumer_group, queue, e
            ))),
        }
    }

    async fn read(
        &self,
        conn: &mut MultiplexedConnection,
        queue: &str,
        cursor: &str,
    ) -> Result<Vec<StreamId>, DomainError> {
        let mut options = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_name)
            .count(1);
        if cursor == NEW_ENTRIES {
            options = options.block(self.config.block_ms);
        }

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[queue], &[cursor], &options)
            .await
            .map_err(|e| DomainError::broker(format!("Failed to read from {}: {}", queue, e)))?;

        Ok(reply
            .map(|r| r.keys.into_iter().flat_map(|k| k.ids).collect())
            .unwrap_or_default())
    }

    async fn ack(&self, conn: &mut MultiplexedConnection, queue: &str, id: &str) {
        let acked: Result<i64, redis::RedisError> =
            conn.xack(queue, &self.config.consumer_group, &[id]).await;
        if let Err(e) = acked {
            // The entry stays pending and is redelivered on the next start.
            tracing::warn!(queue = %queue, message_id = %id, error = %e, "Failed to acknowledge message");
        }
    }

    /// Decodes, handles and settles one entry.
    async fn process(
        &self,
        conn: &mut MultiplexedConnection,
        queue: &str,
        entry: &StreamId,
        handler: &dyn EventHandler,
    ) {
        let decoded = entry
            .get::<Vec<u8>>(BODY_FIELD)
            .ok_or_else(|| DomainError::broker(format!("Entry has no '{}' field", BODY_FIELD)))
            .and_then(|body| EventMessage::from_slice(&body));

        let event = match decoded {
            Ok(message) => message.into_event(),
            Err(e) => {
                tracing::warn!(
                    queue = %queue,
                    message_id = %entry.id,
                    error = %e,
                    "Discarding undecodable message"
                );
                self.ack(conn, queue, &entry.id).await;
                return;
            }
        };

        let event_id = event.id().to_string();
        let origin = event.origin().to_string();
        match handler.handle(event).await {
            Ok(()) => {
                self.ack(conn, queue, &entry.id).await;
                tracing::debug!(
                    queue = %queue,
                    message_id = %entry.id,
                    event_id = %event_id,
                    origin = %origin,
                    handler = handler.name(),
                    "Message handled"
                );
            }
            Err(e) => {
                tracing::warn!(
                    queue = %queue,
                    message_id = %entry.id,
                    event_id = %event_id,
                    origin = %origin,
                    handler = handler.name(),
                    error = %e,
                    "Handler failed, message left pending"
                );
            }
        }
    }
}

#[async_trait]
impl MessageBroker for RedisStreamBroker {
    async fn publish(&self, event: &Event) -> Result<PublishAck, DomainError> {
        let queue = &self.config.queue;
        let body = EventMessage::from_event(event, Timestamp::now()).to_bytes()?;

        let mut conn = self.conn.clone();
        let message_id: String = conn
            .xadd_maxlen(
                queue,
                StreamMaxlen::Approx(self.config.max_len),
                "*",
                &[
                    ("event_id", event.id().as_bytes()),
                    ("origin", event.origin().as_bytes()),
                    (BODY_FIELD, body.as_slice()),
                ],
            )
            .await
            .map_err(|e: redis::RedisError| {
                DomainError::broker(format!(
                    "Failed to publish event {} to {}: {}",
                    event.key(),
                    queue,
                    e
                ))
            })?;

        Ok(PublishAck {
            queue: queue.clone(),
            message_id,
        })
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn EventHandler>,
        cancel: CancellationToken,
    ) -> Result<(), DomainError> {
        // Blocking reads get their own connection so publishers never queue
        // behind them.
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| DomainError::broker(format!("Failed to connect to Redis: {}", e)))?;

        self.ensure_group(&mut conn, queue).await?;

        // Pending entries first, walking forward by id; then new ones.
        let mut pending_cursor = Some(PENDING_CURSOR.to_string());

        while !cancel.is_cancelled() {
            let cursor = pending_cursor.as_deref().unwrap_or(NEW_ENTRIES);
            let entries = self.read(&mut conn, queue, cursor).await?;

            if entries.is_empty() {
                if pending_cursor.take().is_some() {
                    tracing::debug!(queue = %queue, "Pending entries drained");
                }
                continue;
            }

            for entry in &entries {
                if pending_cursor.is_some() {
                    pending_cursor = Some(entry.id.clone());
                }
                self.process(&mut conn, queue, entry, handler.as_ref()).await;
            }
        }

        tracing::info!(queue = %queue, "Consumer stopped");
        Ok(())
    }
}

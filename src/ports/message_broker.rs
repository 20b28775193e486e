//! MessageBroker port - Interface for publishing to and consuming from queues.
//!
//! This port defines how the relay hands events to a message queue without
//! knowing about the underlying transport (Redis Streams, in-memory, etc.).

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::event::Event;
use crate::domain::foundation::DomainError;

use super::EventHandler;

/// Confirmation that the broker accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    /// Queue the message was written to.
    pub queue: String,
    /// Broker-assigned message identifier.
    pub message_id: String,
}

/// Port for the message broker.
///
/// Implementations must ensure:
/// - `publish` returns only after the broker has accepted the message
/// - `consume` acknowledges a message only after the handler succeeded
/// - `consume` stops taking new messages once `cancel` fires, but finishes
///   the message it is currently handling
/// - Messages that cannot be decoded are logged and skipped, never fatal
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publish one event to the configured queue.
    async fn publish(&self, event: &Event) -> Result<PublishAck, DomainError>;

    /// Run the receive loop for `queue` until `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation, or an error if the queue itself
    /// became unusable.
    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn EventHandler>,
        cancel: CancellationToken,
    ) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn MessageBroker) {}
}

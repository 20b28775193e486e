//! EventHandler port - Callback invoked for each consumed event.

use async_trait::async_trait;

use crate::domain::event::Event;
use crate::domain::foundation::DomainError;

/// Handler for events pulled from a broker queue.
///
/// Implementations should be:
/// - **Idempotent** - The broker delivers at-least-once; the same event may
///   arrive again after a crash or a failed acknowledgement
/// - **Quick** - The consume loop handles one message at a time
///
/// Returning an error leaves the message unacknowledged so it is redelivered.
///
/// # Example
///
/// ```ignore
/// struct AuditTrail { /* ... */ }
///
/// #[async_trait]
/// impl EventHandler for AuditTrail {
///     async fn handle(&self, event: Event) -> Result<(), DomainError> {
///         self.store.append(event.key(), event.payload()).await
///     }
///
///     fn name(&self) -> &'static str {
///         "AuditTrail"
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process one event.
    async fn handle(&self, event: Event) -> Result<(), DomainError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

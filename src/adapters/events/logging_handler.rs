//! Default consumer handler: logs every delivered event.

use async_trait::async_trait;

use crate::domain::event::Event;
use crate::domain::foundation::DomainError;
use crate::ports::EventHandler;

/// Handler that records each consumed event in the log and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(&self, event: Event) -> Result<(), DomainError> {
        tracing::info!(
            event_id = %event.id(),
            origin = %event.origin(),
            destiny = %event.destiny(),
            event_type = %event.event_type(),
            payload_bytes = event.payload().len(),
            created_at = %event.created_at(),
            "Event consumed"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingEventHandler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{EventDraft, EventPayload};
    use crate::domain::foundation::Timestamp;

    #[tokio::test]
    async fn handle_always_succeeds() {
        let event = EventDraft::new("E1", "SYS-A", "SYS-B", "T", EventPayload::new(vec![0xff, 0x00]))
            .unwrap()
            .receive(Timestamp::now());

        assert!(LoggingEventHandler.handle(event).await.is_ok());
        assert_eq!(LoggingEventHandler.name(), "LoggingEventHandler");
    }
}

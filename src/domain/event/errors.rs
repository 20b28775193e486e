//! Relay-specific error types.

use crate::domain::foundation::{DomainError, ErrorCode};

use super::DedupKey;

/// Failures of a relay attempt.
///
/// Every variant leaves the ledger without a committed row for the event,
/// so the caller may retry the whole relay. Duplicates are not errors.
#[derive(Debug, Clone)]
pub enum RelayError {
    /// The ledger failed; the transaction was rolled back.
    Storage {
        operation: &'static str,
        key: DedupKey,
        source: DomainError,
    },
    /// The broker failed or rejected the message; the persist was rolled back.
    Publish { key: DedupKey, source: DomainError },
    /// The caller cancelled before anything was published.
    Cancelled { key: DedupKey },
}

impl RelayError {
    pub fn storage(operation: &'static str, key: DedupKey, source: DomainError) -> Self {
        RelayError::Storage {
            operation,
            key,
            source,
        }
    }

    pub fn publish(key: DedupKey, source: DomainError) -> Self {
        RelayError::Publish { key, source }
    }

    pub fn cancelled(key: DedupKey) -> Self {
        RelayError::Cancelled { key }
    }

    /// Dedup key of the event the relay was working on.
    pub fn key(&self) -> &DedupKey {
        match self {
            RelayError::Storage { key, .. }
            | RelayError::Publish { key, .. }
            | RelayError::Cancelled { key } => key,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            RelayError::Storage { .. } => ErrorCode::DatabaseError,
            RelayError::Publish { .. } => ErrorCode::BrokerError,
            RelayError::Cancelled { .. } => ErrorCode::Cancelled,
        }
    }

    /// All relay failures roll back, so resubmitting the same event is safe.
    pub fn is_retryable(&self) -> bool {
        true
    }

    pub fn message(&self) -> String {
        match self {
            RelayError::Storage {
                operation,
                key,
                source,
            } => format!("Storage error during {} of event {}: {}", operation, key, source),
            RelayError::Publish { key, source } => {
                format!("Failed to publish event {}: {}", key, source)
            }
            RelayError::Cancelled { key } => format!("Relay of event {} was cancelled", key),
        }
    }
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Storage { source, .. } | RelayError::Publish { source, .. } => {
                Some(source)
            }
            RelayError::Cancelled { .. } => None,
        }
    }
}

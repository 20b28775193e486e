//! EventStatus enum for tracking the lifecycle of relayed events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Lifecycle status of an inbound event.
///
/// `Pending` belongs to a draft that has not reached the coordinator yet.
/// `Duplicate` is terminal and only ever reported, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    #[default]
    Pending,
    Received,
    Published,
    Duplicate,
}

impl EventStatus {
    /// Upper-case tag used in ledger rows and wire documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "PENDING",
            EventStatus::Received => "RECEIVED",
            EventStatus::Published => "PUBLISHED",
            EventStatus::Duplicate => "DUPLICATE",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EventStatus::Pending),
            "RECEIVED" => Ok(EventStatus::Received),
            "PUBLISHED" => Ok(EventStatus::Published),
            "DUPLICATE" => Ok(EventStatus::Duplicate),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown event status '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_pending() {
        assert_eq!(EventStatus::default(), EventStatus::Pending);
    }

    #[test]
    fn parses_its_own_tags() {
        for status in [
            EventStatus::Pending,
            EventStatus::Received,
            EventStatus::Published,
            EventStatus::Duplicate,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>().unwrap(), status);
        }
    }

    #[test]
    fn rejects_unknown_tag() {
        assert!("received".parse::<EventStatus>().is_err());
    }

    #[test]
    fn serializes_to_upper_case_json() {
        assert_eq!(
            serde_json::to_string(&EventStatus::Received).unwrap(),
            "\"RECEIVED\""
        );
    }
}

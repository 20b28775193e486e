//! Response DTOs for the health check.

use serde::{Deserialize, Serialize};

/// Name reported for the ledger store.
pub const POSTGRES_BASE: &str = "POSTGRES";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub databases: Vec<DatabaseHealth>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseHealth {
    pub base: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn up(last_activity: String) -> Self {
        Self {
            status: "UP".to_string(),
            databases: vec![DatabaseHealth {
                base: POSTGRES_BASE.to_string(),
                last_activity: Some(last_activity),
                error: None,
            }],
        }
    }

    pub fn down(error: String) -> Self {
        Self {
            status: "DOWN".to_string(),
            databases: vec![DatabaseHealth {
                base: POSTGRES_BASE.to_string(),
                last_activity: None,
                error: Some(error),
            }],
        }
    }
}

//! Message broker configuration (Redis Streams)

use serde::Deserialize;

use crate::adapters::events::RedisStreamConfig;

use super::error::ValidationError;

/// Broker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Redis connection URL
    pub url: String,

    /// Queue (stream) events are published to
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Consumer group shared by all instances
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// Name of this instance within the group
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Blocking read timeout in milliseconds
    #[serde(default = "default_block_ms")]
    pub block_ms: usize,

    /// Approximate maximum stream length
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Run a consumer for `queue` in this process
    #[serde(default)]
    pub consume_enabled: bool,
}

impl BrokerConfig {
    /// Settings for the Redis Streams adapter
    pub fn stream_config(&self) -> RedisStreamConfig {
        RedisStreamConfig {
            queue: self.queue.clone(),
            consumer_group: self.consumer_group.clone(),
            consumer_name: self.consumer_name.clone(),
            block_ms: self.block_ms,
            max_len: self.max_len,
        }
    }

    /// Validate broker configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("BROKER_URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.queue.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BROKER_QUEUE"));
        }
        if self.consumer_group.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BROKER_CONSUMER_GROUP"));
        }
        if self.consumer_name.trim().is_empty() {
            return Err(ValidationError::MissingRequired("BROKER_CONSUMER_NAME"));
        }
        if self.block_ms == 0 {
            return Err(ValidationError::NonPositive("broker.block_ms"));
        }
        if self.max_len == 0 {
            return Err(ValidationError::NonPositive("broker.max_len"));
        }
        Ok(())
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            queue: default_queue(),
            consumer_group: default_consumer_group(),
            consumer_name: default_consumer_name(),
            block_ms: default_block_ms(),
            max_len: default_max_len(),
            consume_enabled: false,
        }
    }
}

fn default_queue() -> String {
    "user.events".to_string()
}

fn default_consumer_group() -> String {
    "async-messaging".to_string()
}

fn default_consumer_name() -> String {
    "async-messaging-1".to_string()
}

fn default_block_ms() -> usize {
    1000
}

fn default_max_len() -> usize {
    100_000
}

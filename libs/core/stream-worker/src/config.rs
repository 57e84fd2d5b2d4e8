//! Worker configuration.
//!
//! `WorkerConfig` carries everything a `StreamTaskHandler` / `StageWorkerPool`
//! needs to know about a single stage: which Redis keys it owns and how it
//! should behave when reading, retrying and reclaiming messages.

use crate::registry::StreamDef;
use uuid::Uuid;

/// Configuration for a single pipeline stage.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Redis stream name.
    pub stream_name: String,

    /// Consumer group name.
    pub consumer_group: String,

    /// Unique consumer ID (auto-generated if not provided).
    pub consumer_id: String,

    /// Dead letter queue stream name.
    pub dlq_stream: String,

    /// Sorted set used to hold jobs scheduled for delayed retry.
    pub retry_set: String,

    /// Maximum stream length before trimming.
    pub max_length: i64,

    /// Batch size for reading messages.
    pub batch_size: usize,

    /// Blocking read timeout in milliseconds for `XREADGROUP ... BLOCK`.
    pub block_timeout_ms: u64,

    /// How long (ms) a pending entry may sit unclaimed before it is eligible
    /// for `XAUTOCLAIM`.
    pub claim_idle_ms: u64,

    /// Base delay for the backoff-with-jitter retry formula.
    pub backoff_base_ms: u64,

    /// Cap for the backoff-with-jitter retry formula.
    pub backoff_max_ms: u64,

    /// Retries allowed before a job is sent to the DLQ.
    pub max_retries: u32,
}

impl WorkerConfig {
    /// Build a config from a `StreamDef`, using its associated constants as
    /// defaults.
    pub fn from_stream_def<S: StreamDef>() -> Self {
        Self {
            stream_name: S::STREAM_NAME.to_string(),
            consumer_group: S::CONSUMER_GROUP.to_string(),
            consumer_id: format!("worker-{}", Uuid::new_v4()),
            dlq_stream: S::DLQ_STREAM.to_string(),
            retry_set: S::retry_set_name(),
            max_length: S::MAX_LENGTH,
            batch_size: S::BATCH_SIZE,
            block_timeout_ms: 5_000,
            claim_idle_ms: S::CLAIM_IDLE_MS,
            backoff_base_ms: 2_000,
            backoff_max_ms: 300_000,
            max_retries: 5,
        }
    }

    pub fn with_consumer_id(mut self, id: impl Into<String>) -> Self {
        self.consumer_id = id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_block_timeout_ms(mut self, ms: u64) -> Self {
        self.block_timeout_ms = ms;
        self
    }

    pub fn with_claim_idle_ms(mut self, ms: u64) -> Self {
        self.claim_idle_ms = ms;
        self
    }

    pub fn with_backoff(mut self, base_ms: u64, max_ms: u64) -> Self {
        self.backoff_base_ms = base_ms;
        self.backoff_max_ms = max_ms;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestStream;
    impl StreamDef for TestStream {
        const STREAM_NAME: &'static str = "test:stream";
        const CONSUMER_GROUP: &'static str = "test:group";
        const DLQ_STREAM: &'static str = "test:dlq";
    }

    #[test]
    fn from_stream_def_populates_retry_set() {
        let config = WorkerConfig::from_stream_def::<TestStream>();
        assert_eq!(config.stream_name, "test:stream");
        assert_eq!(config.retry_set, "test:stream:retry");
        assert!(config.consumer_id.starts_with("worker-"));
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = WorkerConfig::from_stream_def::<TestStream>()
            .with_consumer_id("worker-1")
            .with_batch_size(20)
            .with_max_retries(3);
        assert_eq!(config.consumer_id, "worker-1");
        assert_eq!(config.batch_size, 20);
        assert_eq!(config.max_retries, 3);
    }
}

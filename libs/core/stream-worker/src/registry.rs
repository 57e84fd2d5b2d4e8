//! Core trait contracts shared by every stage of a pipeline.
//!
//! - `StreamJob` — a payload that can travel through a Redis stream and be retried.
//! - `StreamDef` — the static identity of a stage: which stream, group, DLQ and retry
//!   set it owns.
//! - `JobExecutor` — the stage's business logic (C2): turns a job into an outcome.
//! - `JobCompletionHandler` — the stage's side-effect policy (C3): what happens to
//!   that outcome (ack, delete, hand off to the next stage, schedule a retry, or DLQ).

use crate::error::StreamError;
use crate::handler::StreamTaskHandler;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A job payload carried on a Redis stream.
///
/// Implementors are domain models (`StoryJob`, `EmailJob`, ...). The trait only
/// asks for what the engine needs to track delivery and retries; everything else
/// is free-form JSON on the wire.
pub trait StreamJob: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Stable identifier used for logging, metrics and DLQ correlation.
    fn job_id(&self) -> String;

    /// Number of times this job has already been retried.
    fn retry_count(&self) -> u32;

    /// Returns a copy of this job with the retry counter incremented.
    fn with_retry(&self) -> Self;

    /// Maximum retries allowed before the job is sent to the DLQ (default: 3).
    fn max_retries(&self) -> u32 {
        3
    }

    fn exceeded_max_retries(&self) -> bool {
        self.retry_count() >= self.max_retries()
    }
}

/// Static identity of a pipeline stage: the Redis keys it owns.
pub trait StreamDef {
    /// Name of the main stream (e.g. `"pipeline:story"`).
    const STREAM_NAME: &'static str;

    /// Consumer group name for this stage.
    const CONSUMER_GROUP: &'static str;

    /// Name of the dead-letter stream for this stage.
    const DLQ_STREAM: &'static str;

    /// MAXLEN (approximate) applied when appending to `STREAM_NAME`.
    const MAX_LENGTH: i64 = 100_000;

    /// Batch size used when reading from the stream.
    const BATCH_SIZE: usize = 10;

    /// How long (ms) a pending entry may sit unacknowledged before a worker
    /// is allowed to reclaim it via `XAUTOCLAIM`.
    const CLAIM_IDLE_MS: u64 = 30_000;

    /// Name of the sorted set used to hold jobs scheduled for delayed retry.
    /// Default derives from `STREAM_NAME`.
    fn retry_set_name() -> String {
        format!("{}:retry", Self::STREAM_NAME)
    }
}

/// C2 — a stage's business logic, independent of how its outcome is handled.
///
/// Implementors should be pure with respect to stream bookkeeping: no acking,
/// deleting, or scheduling retries here. That belongs to `JobCompletionHandler`.
#[async_trait]
pub trait JobExecutor<J: StreamJob>: Send + Sync {
    /// Result produced by a successful execution (e.g. generated story content,
    /// or `()` for a fire-and-forget send).
    type Output: Send + Sync + 'static;

    async fn execute(&self, job: &J) -> Result<Self::Output, StreamError>;

    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;
}

/// C3 — decides what happens to a job after `JobExecutor` has run.
///
/// Implementations own the ordering invariant: anything that must survive a
/// crash between "work done" and "message acked" (appending to the next
/// stage, or scheduling a retry) must happen *before* the ack and delete.
#[async_trait]
pub trait JobCompletionHandler<J: StreamJob, O: Send + Sync + 'static>: Send + Sync {
    async fn on_success(
        &self,
        handler: &StreamTaskHandler,
        stream_id: &str,
        job: &J,
        output: O,
    ) -> Result<(), StreamError>;

    async fn on_failure(
        &self,
        handler: &StreamTaskHandler,
        stream_id: &str,
        job: &J,
        error: StreamError,
    ) -> Result<(), StreamError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct TestJob {
        id: String,
        retry_count: u32,
    }

    impl StreamJob for TestJob {
        fn job_id(&self) -> String {
            self.id.clone()
        }
        fn retry_count(&self) -> u32 {
            self.retry_count
        }
        fn with_retry(&self) -> Self {
            Self {
                id: self.id.clone(),
                retry_count: self.retry_count + 1,
            }
        }
    }

    struct TestStream;
    impl StreamDef for TestStream {
        const STREAM_NAME: &'static str = "test:stream";
        const CONSUMER_GROUP: &'static str = "test:group";
        const DLQ_STREAM: &'static str = "test:dlq";
    }

    #[test]
    fn retry_set_name_derives_from_stream_name() {
        assert_eq!(TestStream::retry_set_name(), "test:stream:retry");
    }

    #[test]
    fn job_retry_bookkeeping() {
        let job = TestJob {
            id: "job-1".into(),
            retry_count: 0,
        };
        assert!(!job.exceeded_max_retries());
        let retried = job.with_retry();
        assert_eq!(retried.retry_count(), 1);
    }
}

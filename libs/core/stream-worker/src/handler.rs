//! `StreamTaskHandler` — the C1 component: the only place in the engine that
//! speaks Redis stream/sorted-set commands directly.
//!
//! Every other component (`StageWorkerPool`, `RetryScheduler`, stage
//! submitters) goes through this handler rather than touching `redis::cmd`
//! itself, so the wire protocol for a stage lives in one place.

use crate::config::WorkerConfig;
use crate::error::StreamError;
use crate::registry::StreamJob;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A job read off a stream, paired with its Redis stream entry ID.
#[derive(Debug, Clone)]
pub struct ReadEntry<J> {
    pub stream_id: String,
    pub job: J,
}

/// Drives the Redis primitives behind a single pipeline stage.
pub struct StreamTaskHandler {
    redis: Arc<ConnectionManager>,
    config: WorkerConfig,
}

impl StreamTaskHandler {
    pub fn new(redis: ConnectionManager, config: WorkerConfig) -> Self {
        Self {
            redis: Arc::new(redis),
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn redis(&self) -> Arc<ConnectionManager> {
        self.redis.clone()
    }

    /// Ensure the consumer group exists, replaying history from the start of
    /// the stream (offset `0`) rather than only new messages — a worker that
    /// starts after jobs were already appended must still see them.
    pub async fn ensure_consumer_group(&self) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                info!(group = %self.config.consumer_group, "created consumer group");
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(StreamError::ConsumerGroup(e.to_string())),
        }
    }

    /// Append a job to this stage's stream (MAXLEN ~ trimmed).
    pub async fn append<J: Serialize + Sync>(&self, job: &J) -> Result<String, StreamError> {
        let mut conn = (*self.redis).clone();
        let payload = serde_json::to_string(job)?;

        let id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.max_length)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        debug!(stream = %self.config.stream_name, stream_id = %id, "appended job");
        Ok(id)
    }

    /// Append a job to an arbitrary stream name (used when C2/C3 hand a job
    /// off to the *next* stage's stream rather than this handler's own).
    pub async fn append_to<J: Serialize + Sync>(
        &self,
        stream_name: &str,
        max_length: i64,
        job: &J,
    ) -> Result<String, StreamError> {
        let mut conn = (*self.redis).clone();
        let payload = serde_json::to_string(job)?;

        let id: String = redis::cmd("XADD")
            .arg(stream_name)
            .arg("MAXLEN")
            .arg("~")
            .arg(max_length)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        Ok(id)
    }

    /// Read this consumer's own pending (delivered, unacked) entries.
    pub async fn read_pending<J: StreamJob>(&self) -> Result<Vec<ReadEntry<J>>, StreamError> {
        let mut conn = (*self.redis).clone();
        let opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_id)
            .count(self.config.batch_size);

        let result: Result<StreamReadReply, _> = conn
            .xread_options(&[&self.config.stream_name], &["0"], &opts)
            .await;

        match result {
            Ok(reply) => self.parse_reply(reply),
            Err(e) if e.to_string().to_lowercase().contains("timeout") => Ok(vec![]),
            Err(e) => Err(StreamError::Redis(e)),
        }
    }

    /// Blocking read of new (`>`) entries for this consumer group.
    pub async fn read_new<J: StreamJob>(&self) -> Result<Vec<ReadEntry<J>>, StreamError> {
        let mut conn = (*self.redis).clone();
        let opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_id)
            .count(self.config.batch_size)
            .block(self.config.block_timeout_ms as usize);

        let result: Result<StreamReadReply, _> = conn
            .xread_options(&[&self.config.stream_name], &[">"], &opts)
            .await;

        match result {
            Ok(reply) => self.parse_reply(reply),
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("timeout") || err_str.contains("timed out") {
                    Ok(vec![])
                } else {
                    Err(StreamError::Redis(e))
                }
            }
        }
    }

    fn parse_reply<J: StreamJob>(
        &self,
        reply: StreamReadReply,
    ) -> Result<Vec<ReadEntry<J>>, StreamError> {
        let mut entries = Vec::new();
        for key in reply.keys {
            for message in key.ids {
                match Self::parse_job::<J>(&message.map) {
                    Ok(job) => entries.push(ReadEntry {
                        stream_id: message.id,
                        job,
                    }),
                    Err(e) => {
                        warn!(stream_id = %message.id, error = %e, "dropping unparseable entry");
                    }
                }
            }
        }
        Ok(entries)
    }

    fn parse_job<J: StreamJob>(map: &HashMap<String, redis::Value>) -> Result<J, StreamError> {
        let value = map
            .get("job")
            .ok_or_else(|| StreamError::JobParsing("missing 'job' field".into()))?;

        let raw = match value {
            redis::Value::BulkString(bytes) => String::from_utf8_lossy(bytes).to_string(),
            redis::Value::SimpleString(s) => s.clone(),
            _ => return Err(StreamError::JobParsing("unexpected 'job' field type".into())),
        };

        Ok(serde_json::from_str(&raw)?)
    }

    /// Acknowledge a delivered entry.
    pub async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();
        let _: () = conn
            .xack(&self.config.stream_name, &self.config.consumer_group, &[stream_id])
            .await?;
        Ok(())
    }

    /// Remove the entry from the stream entirely (after it has been acked).
    pub async fn delete(&self, stream_id: &str) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();
        let _: i64 = conn.xdel(&self.config.stream_name, &[stream_id]).await?;
        Ok(())
    }

    /// Schedule a job for delayed retry by writing it into this stage's retry
    /// sorted set, scored by the Unix-ms timestamp at which it becomes due.
    pub async fn schedule_retry<J: StreamJob>(
        &self,
        job: &J,
        delay: Duration,
    ) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();
        let run_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        let payload = serde_json::to_string(job)?;

        let _: () = conn
            .zadd(&self.config.retry_set, payload, run_at)
            .await?;

        debug!(
            job_id = %job.job_id(),
            retry_count = job.retry_count(),
            run_at,
            "scheduled retry"
        );
        Ok(())
    }

    /// Move every entry in the retry set whose score (`run_at`) has passed
    /// back onto the live stream, then remove it from the retry set.
    ///
    /// Returns the number of jobs re-enqueued.
    pub async fn reenqueue_due(&self) -> Result<usize, StreamError> {
        let mut conn = (*self.redis).clone();
        let now = Utc::now().timestamp_millis();

        let due: Vec<String> = conn
            .zrangebyscore(&self.config.retry_set, 0, now)
            .await?;

        let mut moved = 0;
        for payload in due {
            let id: String = redis::cmd("XADD")
                .arg(&self.config.stream_name)
                .arg("MAXLEN")
                .arg("~")
                .arg(self.config.max_length)
                .arg("*")
                .arg("job")
                .arg(&payload)
                .query_async(&mut conn)
                .await?;

            let removed: i64 = conn.zrem(&self.config.retry_set, &payload).await?;
            if removed > 0 {
                moved += 1;
                debug!(stream_id = %id, "re-enqueued due retry");
            }
        }

        Ok(moved)
    }

    /// Append a job (with its failure context) to the DLQ stream.
    pub async fn append_dlq<J: StreamJob>(
        &self,
        job: &J,
        error: &str,
        original_stream_id: &str,
    ) -> Result<String, StreamError> {
        let mut conn = (*self.redis).clone();
        let job_json = serde_json::to_string(job)?;

        let id: String = redis::cmd("XADD")
            .arg(&self.config.dlq_stream)
            .arg("*")
            .arg("job")
            .arg(&job_json)
            .arg("error")
            .arg(error)
            .arg("original_stream_id")
            .arg(original_stream_id)
            .arg("retry_count")
            .arg(job.retry_count())
            .arg("failed_at")
            .arg(Utc::now().to_rfc3339())
            .query_async(&mut conn)
            .await?;

        warn!(job_id = %job.job_id(), dlq_id = %id, error = %error, "moved job to DLQ");
        Ok(id)
    }

    /// Claim pending entries idle for at least `idle_ms`, reassigning them to
    /// this consumer. Called once on startup with `idle_ms = 0` (claim
    /// everything left behind by a previous consumer ID) and periodically
    /// thereafter with the configured claim threshold.
    pub async fn claim_abandoned(&self, idle_ms: u64) -> Result<usize, StreamError> {
        let mut conn = (*self.redis).clone();
        let mut start_id = "0-0".to_string();
        let mut claimed = 0;

        loop {
            let result: redis::Value = redis::cmd("XAUTOCLAIM")
                .arg(&self.config.stream_name)
                .arg(&self.config.consumer_group)
                .arg(&self.config.consumer_id)
                .arg(idle_ms)
                .arg(&start_id)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .unwrap_or(redis::Value::Nil);

            let redis::Value::Array(arr) = &result else {
                break;
            };
            if arr.len() < 2 {
                break;
            }

            let redis::Value::BulkString(next_id) = &arr[0] else {
                break;
            };
            let next = String::from_utf8_lossy(next_id).to_string();

            let redis::Value::Array(messages) = &arr[1] else {
                break;
            };
            claimed += messages.len();

            if next == "0-0" || messages.is_empty() {
                break;
            }
            start_id = next;
        }

        if claimed > 0 {
            info!(consumer = %self.config.consumer_id, count = claimed, "claimed abandoned entries");
        }
        Ok(claimed)
    }
}

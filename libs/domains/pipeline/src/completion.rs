//! C3 — each stage's side-effect policy: what happens to a job after its
//! `JobExecutor` has run.
//!
//! The ordering invariant: anything that must survive a crash between "work
//! done" and "message acked" happens before the ack/delete. Appending to the
//! next stage's stream, or writing a retry to the retry set, always happens
//! first. `on_failure` and sending to the DLQ are mutually exclusive — a job
//! either goes back into the retry set, or (once it has exceeded its retry
//! budget) straight to the DLQ, never both.

use crate::models::{Job, JobStatus};
use crate::repository::RelationalStore;
use crate::streams::EmailStream;
use async_trait::async_trait;
use std::sync::Arc;
use stream_worker::{
    retry_delay, JobCompletionHandler, StreamDef, StreamError, StreamJob, StreamTaskHandler,
};
use tracing::{error, warn};

pub struct StoryCompletionHandler {
    store: Arc<dyn RelationalStore>,
}

impl StoryCompletionHandler {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobCompletionHandler<Job, crate::executor::StoryOutput> for StoryCompletionHandler {
    async fn on_success(
        &self,
        handler: &StreamTaskHandler,
        stream_id: &str,
        job: &Job,
        output: crate::executor::StoryOutput,
    ) -> Result<(), StreamError> {
        handler
            .append_to(EmailStream::STREAM_NAME, EmailStream::MAX_LENGTH, &output.next_job)
            .await?;

        self.store
            .update_story_job_status(job.job_id, JobStatus::Completed)
            .await
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        handler.ack(stream_id).await?;
        handler.delete(stream_id).await?;
        Ok(())
    }

    async fn on_failure(
        &self,
        handler: &StreamTaskHandler,
        stream_id: &str,
        job: &Job,
        error: StreamError,
    ) -> Result<(), StreamError> {
        let config = handler.config();
        if job.retry_count() >= config.max_retries {
            handler
                .append_dlq(job, &error.to_string(), stream_id)
                .await?;
            if let Err(e) = self
                .store
                .update_story_job_status(job.job_id, JobStatus::Failed)
                .await
            {
                error!(job_id = job.job_id, error = %e, "failed to mark story job failed after DLQ");
            }
        } else {
            let delay = retry_delay(job.retry_count, config.backoff_base_ms, config.backoff_max_ms);
            handler.schedule_retry(&job.with_retry(), delay).await?;
            warn!(job_id = job.job_id, retry_count = job.retry_count, "story job scheduled for retry");
        }

        handler.ack(stream_id).await?;
        handler.delete(stream_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::StoryOutput;
    use crate::repository::InMemoryRelationalStore;
    use crate::streams::StoryStream;
    use redis::aio::ConnectionManager;
    use stream_worker::WorkerConfig;
    use test_utils::TestRedis;
    use uuid::Uuid;

    async fn handler_against(redis: &TestRedis) -> StreamTaskHandler {
        let client = redis::Client::open(redis.connection_string().to_string()).unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        StreamTaskHandler::new(conn, WorkerConfig::from_stream_def::<StoryStream>())
    }

    #[tokio::test]
    async fn on_success_appends_next_job_and_acks() {
        let redis = TestRedis::new().await;
        let handler = handler_against(&redis).await;
        handler.ensure_consumer_group().await.unwrap();

        let store = Arc::new(InMemoryRelationalStore::new());
        let story_id = store.create_story(Uuid::nil(), "pirates").await.unwrap();
        let job_id = store
            .create_story_job(story_id, Uuid::nil(), "a@x")
            .await
            .unwrap();
        let job = Job::new(job_id, Uuid::nil(), story_id, "a@x".into(), "pirates".into(), "req-1".into());
        let stream_id = handler.append(&job).await.unwrap();

        let next_job = job.for_next_stage(99);
        let completion = StoryCompletionHandler::new(store.clone());
        completion
            .on_success(
                &handler,
                &stream_id,
                &job,
                StoryOutput { content: "arr".into(), next_job },
            )
            .await
            .unwrap();

        assert_eq!(store.story_job_status(job_id), Some(JobStatus::Completed));

        let mut conn = redis::Client::open(redis.connection_string().to_string())
            .unwrap()
            .get_multiplexed_async_connection()
            .await
            .unwrap();
        let email_len: i64 = redis::cmd("XLEN")
            .arg(EmailStream::STREAM_NAME)
            .query_async(&mut conn)
            .await
            .unwrap();
        assert_eq!(email_len, 1, "on_success must append before acking");
    }

    #[tokio::test]
    async fn on_failure_schedules_retry_when_budget_remains() {
        let redis = TestRedis::new().await;
        let handler = handler_against(&redis).await;
        handler.ensure_consumer_group().await.unwrap();

        let store = Arc::new(InMemoryRelationalStore::new());
        let story_id = store.create_story(Uuid::nil(), "pirates").await.unwrap();
        let job_id = store
            .create_story_job(story_id, Uuid::nil(), "a@x")
            .await
            .unwrap();
        let job = Job::new(job_id, Uuid::nil(), story_id, "a@x".into(), "pirates".into(), "req-1".into());
        let stream_id = handler.append(&job).await.unwrap();

        let completion = StoryCompletionHandler::new(store.clone());
        completion
            .on_failure(&handler, &stream_id, &job, StreamError::Processing("boom".into()))
            .await
            .unwrap();

        let mut conn = redis::Client::open(redis.connection_string().to_string())
            .unwrap()
            .get_multiplexed_async_connection()
            .await
            .unwrap();
        let retry_len: i64 = redis::cmd("ZCARD")
            .arg(StoryStream::retry_set_name())
            .query_async(&mut conn)
            .await
            .unwrap();
        assert_eq!(retry_len, 1);
    }
}

pub struct EmailCompletionHandler {
    store: Arc<dyn RelationalStore>,
}

impl EmailCompletionHandler {
    pub fn new(store: Arc<dyn RelationalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobCompletionHandler<Job, ()> for EmailCompletionHandler {
    async fn on_success(
        &self,
        handler: &StreamTaskHandler,
        stream_id: &str,
        job: &Job,
        _output: (),
    ) -> Result<(), StreamError> {
        self.store
            .update_email_job_status(job.job_id, JobStatus::Completed)
            .await
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        handler.ack(stream_id).await?;
        handler.delete(stream_id).await?;
        Ok(())
    }

    async fn on_failure(
        &self,
        handler: &StreamTaskHandler,
        stream_id: &str,
        job: &Job,
        error: StreamError,
    ) -> Result<(), StreamError> {
        let config = handler.config();
        if job.retry_count() >= config.max_retries {
            handler
                .append_dlq(job, &error.to_string(), stream_id)
                .await?;
            if let Err(e) = self
                .store
                .update_email_job_status(job.job_id, JobStatus::Failed)
                .await
            {
                error!(job_id = job.job_id, error = %e, "failed to mark email job failed after DLQ");
            }
        } else {
            let delay = retry_delay(job.retry_count, config.backoff_base_ms, config.backoff_max_ms);
            handler.schedule_retry(&job.with_retry(), delay).await?;
            warn!(job_id = job.job_id, retry_count = job.retry_count, "email job scheduled for retry");
        }

        handler.ack(stream_id).await?;
        handler.delete(stream_id).await?;
        Ok(())
    }
}

//! C2 — the two stages' business logic. Each executor only does the work;
//! it never acks, deletes, retries, or DLQs a message. That's
//! `JobCompletionHandler`'s job (`completion.rs`).

use crate::models::{Job, JobStatus};
use crate::ports::{SharedAiStoryGenerator, SharedEmailSender};
use crate::repository::RelationalStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{JobExecutor, StreamError};
use tokio::time::timeout;

/// Per-job execution budget, per the external interfaces section: an
/// executor that hangs longer than this is treated as a transient failure
/// and retried like any other.
const EXECUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Output of a successful story generation: the story content (already
/// persisted) and the next-stage job, whose `email_jobs` row has already
/// been inserted as `pending` — the completion handler only has to append
/// it to the email stream.
pub struct StoryOutput {
    pub content: String,
    pub next_job: Job,
}

pub struct StoryExecutor {
    generator: SharedAiStoryGenerator,
    store: Arc<dyn RelationalStore>,
}

impl StoryExecutor {
    pub fn new(generator: SharedAiStoryGenerator, store: Arc<dyn RelationalStore>) -> Self {
        Self { generator, store }
    }
}

#[async_trait]
impl JobExecutor<Job> for StoryExecutor {
    type Output = StoryOutput;

    async fn execute(&self, job: &Job) -> Result<Self::Output, StreamError> {
        self.store
            .update_story_job_status(job.job_id, JobStatus::Processing)
            .await
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        let content = timeout(EXECUTE_TIMEOUT, self.generator.generate(&job.user_preferences))
            .await
            .map_err(|_| StreamError::Timeout("story generation".into()))?
            .map_err(|e| StreamError::Processing(e.to_string()))?;

        self.store
            .save_story_content(job.story_id, &content)
            .await
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        let email_job_id = self
            .store
            .create_email_job(job.story_id, job.user_id, &job.user_email)
            .await
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        let next_job = job.for_next_stage(email_job_id);

        Ok(StoryOutput { content, next_job })
    }

    fn name(&self) -> &'static str {
        "story_executor"
    }
}

pub struct EmailExecutor {
    sender: SharedEmailSender,
    store: Arc<dyn RelationalStore>,
}

impl EmailExecutor {
    pub fn new(sender: SharedEmailSender, store: Arc<dyn RelationalStore>) -> Self {
        Self { sender, store }
    }
}

#[async_trait]
impl JobExecutor<Job> for EmailExecutor {
    type Output = ();

    async fn execute(&self, job: &Job) -> Result<Self::Output, StreamError> {
        self.store
            .update_email_job_status(job.job_id, JobStatus::Processing)
            .await
            .map_err(|e| StreamError::Internal(e.to_string()))?;

        timeout(EXECUTE_TIMEOUT, self.sender.send(&job.user_email))
            .await
            .map_err(|_| StreamError::Timeout("email delivery".into()))?
            .map_err(|e| StreamError::Processing(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "email_executor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MockAiStoryGenerator, MockEmailSender};
    use crate::repository::InMemoryRelationalStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn story_executor_persists_content_and_queues_email_job() {
        let store = Arc::new(InMemoryRelationalStore::new());
        let story_id = store.create_story(Uuid::nil(), "pirates").await.unwrap();
        let job_id = store
            .create_story_job(story_id, Uuid::nil(), "a@x")
            .await
            .unwrap();
        let job = Job::new(job_id, Uuid::nil(), story_id, "a@x".into(), "pirates".into(), "req-1".into());

        let executor = StoryExecutor::new(Arc::new(MockAiStoryGenerator::new()), store.clone());
        let output = executor.execute(&job).await.unwrap();

        assert!(output.content.contains("pirates"));
        assert_eq!(store.story_content(story_id), Some(output.content));
        assert_eq!(
            store.story_job_status(job_id),
            Some(JobStatus::Processing),
            "executor updates to processing but leaves completion to the handler"
        );
        assert!(output.next_job.job_id > 0);
    }

    #[tokio::test]
    async fn email_executor_fails_when_sender_fails() {
        let store = Arc::new(InMemoryRelationalStore::new());
        let job_id = store
            .create_email_job(Uuid::nil(), Uuid::nil(), "a@x")
            .await
            .unwrap();
        let job = Job::new(job_id, Uuid::nil(), Uuid::nil(), "a@x".into(), "pirates".into(), "req-1".into());

        let executor = EmailExecutor::new(Arc::new(MockEmailSender::failing(1)), store);

        assert!(executor.execute(&job).await.is_err());
    }
}

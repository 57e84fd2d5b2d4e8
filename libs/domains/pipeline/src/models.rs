//! The pipeline's data model: the `Job` payload carried on both stages'
//! streams, and the `PersistedJobRecord` status row each stage maintains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream_worker::StreamJob;
use uuid::Uuid;

/// Unit of work flowing through the pipeline. The same shape travels on both
/// the story stream and the email stream; a stage never reads the other
/// stage's persisted row, it carries everything it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Assigned by the relational store when the stage's `PersistedJobRecord`
    /// is created. Immutable for the lifetime of the job at that stage.
    pub job_id: i64,
    pub user_id: Uuid,
    pub story_id: Uuid,
    pub user_email: String,
    pub user_preferences: String,
    pub retry_count: u32,
    pub request_id: String,
}

impl Job {
    pub fn new(
        job_id: i64,
        user_id: Uuid,
        story_id: Uuid,
        user_email: String,
        user_preferences: String,
        request_id: String,
    ) -> Self {
        Self {
            job_id,
            user_id,
            story_id,
            user_email,
            user_preferences,
            retry_count: 0,
            request_id,
        }
    }

    /// Carry this job's fields into the next stage, under a new stage-local
    /// `job_id`, with `retry_count` reset to 0 — downstream retries start
    /// from scratch, they don't inherit upstream attempts.
    pub fn for_next_stage(&self, next_job_id: i64) -> Self {
        Self {
            job_id: next_job_id,
            retry_count: 0,
            ..self.clone()
        }
    }
}

impl StreamJob for Job {
    fn job_id(&self) -> String {
        self.job_id.to_string()
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn with_retry(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

/// Status of a `PersistedJobRecord`. Observable by operators, never gates
/// queue behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// One row per stage per job. `referent_id` is the story for the story stage
/// and `(story_id, user_id)` conceptually for the email stage — represented
/// here as `story_id` plus the denormalized `user_id`, since both rows live
/// in their own stage-scoped table (`story_jobs`, `email_jobs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedJobRecord {
    pub id: i64,
    pub story_id: Uuid,
    pub user_id: Uuid,
    pub status: JobStatus,
    pub updated_at: DateTime<Utc>,
}

/// A generated story. Written by the story executor, read by nothing inside
/// the pipeline (the email stage only needs `UserEmail`, already denormalized
/// onto the `Job`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub user_id: Uuid,
    pub preferences: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for `POST /stories`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStoryRequest {
    pub user_id: Uuid,
    pub user_email: String,
    pub preferences: String,
}

/// Response body for `POST /stories`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateStoryResponse {
    pub story_id: Uuid,
    pub story_job_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_stage_resets_retry_count() {
        let job = Job::new(1, Uuid::nil(), Uuid::nil(), "a@x".into(), "pirates".into(), "req-1".into())
            .with_retry()
            .with_retry();
        assert_eq!(job.retry_count, 2);

        let next = job.for_next_stage(2);
        assert_eq!(next.retry_count, 0);
        assert_eq!(next.job_id, 2);
        assert_eq!(next.user_email, job.user_email);
    }

    #[test]
    fn job_status_round_trips_through_display_and_from_str() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let parsed: JobStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}

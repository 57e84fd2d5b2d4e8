//! The pipeline's relational store: a small port trait over the three
//! tables (`stories`, `story_jobs`, `email_jobs`), a sea-orm-backed
//! implementation, and an in-memory double for tests.

use crate::entity::{email_jobs, stories, story_jobs};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{JobStatus, PersistedJobRecord, Story};
use async_trait::async_trait;
use database::BaseRepository;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Persistence operations the two executors and the submitter need. Neither
/// stage reads the other stage's table — each only writes and advances its
/// own status row.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn create_story(&self, user_id: Uuid, preferences: &str) -> PipelineResult<Uuid>;

    async fn save_story_content(&self, story_id: Uuid, content: &str) -> PipelineResult<()>;

    async fn create_story_job(
        &self,
        story_id: Uuid,
        user_id: Uuid,
        user_email: &str,
    ) -> PipelineResult<i64>;

    async fn update_story_job_status(&self, job_id: i64, status: JobStatus) -> PipelineResult<()>;

    async fn create_email_job(
        &self,
        story_id: Uuid,
        user_id: Uuid,
        user_email: &str,
    ) -> PipelineResult<i64>;

    async fn update_email_job_status(&self, job_id: i64, status: JobStatus) -> PipelineResult<()>;
}

pub struct PgRelationalStore {
    stories: BaseRepository<stories::Entity>,
    story_jobs: BaseRepository<story_jobs::Entity>,
    email_jobs: BaseRepository<email_jobs::Entity>,
}

impl PgRelationalStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            stories: BaseRepository::new(db.clone()),
            story_jobs: BaseRepository::new(db.clone()),
            email_jobs: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl RelationalStore for PgRelationalStore {
    async fn create_story(&self, user_id: Uuid, preferences: &str) -> PipelineResult<Uuid> {
        let now = chrono::Utc::now().into();
        let active_model = stories::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(user_id),
            preferences: Set(preferences.to_string()),
            content: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = self.stories.insert(active_model).await?;
        Ok(model.id)
    }

    async fn save_story_content(&self, story_id: Uuid, content: &str) -> PipelineResult<()> {
        let existing = self
            .stories
            .find_by_id(story_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("story {story_id}")))?;

        let active_model = stories::ActiveModel {
            id: Set(existing.id),
            user_id: Set(existing.user_id),
            preferences: Set(existing.preferences),
            content: Set(Some(content.to_string())),
            created_at: Set(existing.created_at),
            updated_at: Set(chrono::Utc::now().into()),
        };
        active_model.update(self.stories.db()).await?;
        Ok(())
    }

    async fn create_story_job(
        &self,
        story_id: Uuid,
        user_id: Uuid,
        user_email: &str,
    ) -> PipelineResult<i64> {
        let model = self
            .story_jobs
            .insert(story_jobs::new_active_model(
                story_id,
                user_id,
                user_email.to_string(),
            ))
            .await?;
        Ok(model.id)
    }

    async fn update_story_job_status(&self, job_id: i64, status: JobStatus) -> PipelineResult<()> {
        update_status(&self.story_jobs, job_id, |m| story_jobs::ActiveModel {
            id: Set(m.id),
            story_id: Set(m.story_id),
            user_id: Set(m.user_id),
            user_email: Set(m.user_email.clone()),
            status: Set(status.to_string()),
            created_at: Set(m.created_at),
            updated_at: Set(chrono::Utc::now().into()),
        })
        .await
    }

    async fn create_email_job(
        &self,
        story_id: Uuid,
        user_id: Uuid,
        user_email: &str,
    ) -> PipelineResult<i64> {
        let model = self
            .email_jobs
            .insert(email_jobs::new_active_model(
                story_id,
                user_id,
                user_email.to_string(),
            ))
            .await?;
        Ok(model.id)
    }

    async fn update_email_job_status(&self, job_id: i64, status: JobStatus) -> PipelineResult<()> {
        update_status(&self.email_jobs, job_id, |m| email_jobs::ActiveModel {
            id: Set(m.id),
            story_id: Set(m.story_id),
            user_id: Set(m.user_id),
            user_email: Set(m.user_email.clone()),
            status: Set(status.to_string()),
            created_at: Set(m.created_at),
            updated_at: Set(chrono::Utc::now().into()),
        })
        .await
    }
}

async fn update_status<E, F>(
    repo: &BaseRepository<E>,
    job_id: i64,
    build: F,
) -> PipelineResult<()>
where
    E: sea_orm::EntityTrait,
    E::Model: Clone,
    F: FnOnce(&E::Model) -> E::ActiveModel,
    E::ActiveModel: ActiveModelTrait<Entity = E> + Send,
{
    let existing = repo
        .find_by_id(job_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("job {job_id}")))?;
    repo.update(build(&existing)).await?;
    Ok(())
}

/// In-memory double used by executor/completion-handler unit tests. Not
/// thread-contended in practice (tests run single jobs at a time) so a
/// `std::sync::Mutex` is sufficient.
#[derive(Default)]
pub struct InMemoryRelationalStore {
    stories: Mutex<HashMap<Uuid, Story>>,
    story_jobs: Mutex<HashMap<i64, PersistedJobRecord>>,
    email_jobs: Mutex<HashMap<i64, PersistedJobRecord>>,
    next_job_id: Mutex<i64>,
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        let mut guard = self.next_job_id.lock().unwrap();
        *guard += 1;
        *guard
    }

    pub fn story_content(&self, story_id: Uuid) -> Option<String> {
        self.stories.lock().unwrap().get(&story_id)?.content.clone()
    }

    pub fn story_job_status(&self, job_id: i64) -> Option<JobStatus> {
        self.story_jobs.lock().unwrap().get(&job_id).map(|r| r.status)
    }

    pub fn email_job_status(&self, job_id: i64) -> Option<JobStatus> {
        self.email_jobs.lock().unwrap().get(&job_id).map(|r| r.status)
    }
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore {
    async fn create_story(&self, user_id: Uuid, preferences: &str) -> PipelineResult<Uuid> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();
        self.stories.lock().unwrap().insert(
            id,
            Story {
                id,
                user_id,
                preferences: preferences.to_string(),
                content: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn save_story_content(&self, story_id: Uuid, content: &str) -> PipelineResult<()> {
        let mut stories = self.stories.lock().unwrap();
        let story = stories
            .get_mut(&story_id)
            .ok_or_else(|| PipelineError::NotFound(format!("story {story_id}")))?;
        story.content = Some(content.to_string());
        story.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn create_story_job(
        &self,
        story_id: Uuid,
        user_id: Uuid,
        _user_email: &str,
    ) -> PipelineResult<i64> {
        let id = self.next_id();
        self.story_jobs.lock().unwrap().insert(
            id,
            PersistedJobRecord {
                id,
                story_id,
                user_id,
                status: JobStatus::Pending,
                updated_at: chrono::Utc::now(),
            },
        );
        Ok(id)
    }

    async fn update_story_job_status(&self, job_id: i64, status: JobStatus) -> PipelineResult<()> {
        let mut jobs = self.story_jobs.lock().unwrap();
        let record = jobs
            .get_mut(&job_id)
            .ok_or_else(|| PipelineError::NotFound(format!("story job {job_id}")))?;
        record.status = status;
        record.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn create_email_job(
        &self,
        story_id: Uuid,
        user_id: Uuid,
        _user_email: &str,
    ) -> PipelineResult<i64> {
        let id = self.next_id();
        self.email_jobs.lock().unwrap().insert(
            id,
            PersistedJobRecord {
                id,
                story_id,
                user_id,
                status: JobStatus::Pending,
                updated_at: chrono::Utc::now(),
            },
        );
        Ok(id)
    }

    async fn update_email_job_status(&self, job_id: i64, status: JobStatus) -> PipelineResult<()> {
        let mut jobs = self.email_jobs.lock().unwrap();
        let record = jobs
            .get_mut(&job_id)
            .ok_or_else(|| PipelineError::NotFound(format!("email job {job_id}")))?;
        record.status = status;
        record.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_store_tracks_story_lifecycle() {
        let store = InMemoryRelationalStore::new();
        let story_id = store.create_story(Uuid::nil(), "pirates").await.unwrap();
        assert_eq!(store.story_content(story_id), None);

        store.save_story_content(story_id, "arr").await.unwrap();
        assert_eq!(store.story_content(story_id), Some("arr".to_string()));
    }

    #[tokio::test]
    async fn in_memory_store_tracks_job_status() {
        let store = InMemoryRelationalStore::new();
        let job_id = store
            .create_story_job(Uuid::nil(), Uuid::nil(), "a@x")
            .await
            .unwrap();
        assert_eq!(store.story_job_status(job_id), Some(JobStatus::Pending));

        store
            .update_story_job_status(job_id, JobStatus::Completed)
            .await
            .unwrap();
        assert_eq!(store.story_job_status(job_id), Some(JobStatus::Completed));
    }

    #[tokio::test]
    async fn updating_unknown_job_is_not_found() {
        let store = InMemoryRelationalStore::new();
        let err = store.update_email_job_status(999, JobStatus::Failed).await;
        assert!(err.is_err());
    }
}

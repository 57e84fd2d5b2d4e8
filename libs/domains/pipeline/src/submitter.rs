//! C6 — pipeline composition and submission: the one place a brand new job
//! enters the system. Persists a `pending` `story_jobs` row, builds the wire
//! `Job` with `retry_count = 0`, and appends it to the story stream.

use crate::error::{PipelineError, PipelineResult};
use crate::models::{CreateStoryResponse, Job};
use crate::repository::RelationalStore;
use crate::streams::StoryStream;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{http::StatusCode, Json};
use std::sync::Arc;
use stream_worker::{StreamDef, StreamTaskHandler};

use crate::models::CreateStoryRequest;

pub struct StageSubmitter {
    store: Arc<dyn RelationalStore>,
    handler: Arc<StreamTaskHandler>,
}

impl StageSubmitter {
    pub fn new(store: Arc<dyn RelationalStore>, handler: Arc<StreamTaskHandler>) -> Self {
        Self { store, handler }
    }

    /// Create a story, persist its stage-1 status row as `pending`, and
    /// append the resulting job to the story stream. Returns the story and
    /// job ids so the caller can poll status later.
    pub async fn submit_story(&self, req: CreateStoryRequest) -> PipelineResult<CreateStoryResponse> {
        let story_id = self.store.create_story(req.user_id, &req.preferences).await?;
        let job_id = self
            .store
            .create_story_job(story_id, req.user_id, &req.user_email)
            .await?;

        let job = Job::new(
            job_id,
            req.user_id,
            story_id,
            req.user_email,
            req.preferences,
            uuid::Uuid::new_v4().to_string(),
        );

        self.handler
            .append_to(StoryStream::STREAM_NAME, StoryStream::MAX_LENGTH, &job)
            .await
            .map_err(PipelineError::from)?;

        Ok(CreateStoryResponse { story_id, story_job_id: job_id })
    }
}

pub async fn create_story_handler(
    State(submitter): State<Arc<StageSubmitter>>,
    Json(req): Json<CreateStoryRequest>,
) -> impl IntoResponse {
    match submitter.submit_story(req).await {
        Ok(resp) => (StatusCode::ACCEPTED, Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRelationalStore;
    use redis::aio::ConnectionManager;
    use stream_worker::WorkerConfig;
    use test_utils::TestRedis;

    #[tokio::test]
    async fn submit_story_persists_row_and_appends_job() {
        let redis = TestRedis::new().await;
        let client = redis::Client::open(redis.connection_string().to_string()).unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();
        let handler = Arc::new(StreamTaskHandler::new(
            conn,
            WorkerConfig::from_stream_def::<StoryStream>(),
        ));
        handler.ensure_consumer_group().await.unwrap();

        let store = Arc::new(InMemoryRelationalStore::new());
        let submitter = StageSubmitter::new(store.clone(), handler.clone());

        let response = submitter
            .submit_story(CreateStoryRequest {
                user_id: uuid::Uuid::nil(),
                user_email: "a@x".into(),
                preferences: "pirates".into(),
            })
            .await
            .unwrap();

        assert_eq!(
            store.story_job_status(response.story_job_id),
            Some(crate::models::JobStatus::Pending)
        );

        let mut raw_conn = redis::Client::open(redis.connection_string().to_string())
            .unwrap()
            .get_multiplexed_async_connection()
            .await
            .unwrap();
        let len: i64 = redis::cmd("XLEN")
            .arg(StoryStream::STREAM_NAME)
            .query_async(&mut raw_conn)
            .await
            .unwrap();
        assert_eq!(len, 1);
    }
}

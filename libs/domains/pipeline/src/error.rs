use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("queue error: {0}")]
    Queue(String),

    #[error("story generation failed: {0}")]
    StoryGeneration(String),

    #[error("email delivery failed: {0}")]
    EmailDelivery(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

impl From<sea_orm::DbErr> for PipelineError {
    fn from(err: sea_orm::DbErr) -> Self {
        PipelineError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for PipelineError {
    fn from(err: redis::RedisError) -> Self {
        PipelineError::Queue(err.to_string())
    }
}

impl From<stream_worker::StreamError> for PipelineError {
    fn from(err: stream_worker::StreamError) -> Self {
        PipelineError::Queue(err.to_string())
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::NotFound(msg) => AppError::NotFound(msg),
            PipelineError::Validation(msg) => AppError::BadRequest(msg),
            PipelineError::Database(msg) => {
                AppError::InternalServerError(format!("database error: {msg}"))
            }
            PipelineError::Queue(msg) => AppError::ServiceUnavailable(format!("queue error: {msg}")),
            PipelineError::StoryGeneration(msg) => AppError::InternalServerError(msg),
            PipelineError::EmailDelivery(msg) => AppError::InternalServerError(msg),
            PipelineError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

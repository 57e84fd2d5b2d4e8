//! Story generation and email notification pipeline.
//!
//! Two stages, each driven by the same engine shape: a `StreamTaskHandler`
//! (C1) reads/acks/retries against Redis, a `JobExecutor` (C2) does the
//! stage's actual work, and a `JobCompletionHandler` (C3) decides what
//! happens next. A `StageWorkerPool` (C4) runs `N` workers per stage; a
//! `RetryScheduler` (C5) sweeps due retries back onto the live stream.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ POST /stories│  ← StageSubmitter (C6)
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐      ┌──────────────┐
//! │ pipeline:story│ ───▶ │ StoryExecutor │ ─ on success ─▶ pipeline:email
//! └──────────────┘      └──────┬───────┘
//!                              │ on failure: retry or DLQ
//!                       pipeline:story:retry / pipeline:story:dlq
//!
//! ┌──────────────┐      ┌──────────────┐
//! │ pipeline:email│ ───▶ │ EmailExecutor │ ─ on success ─▶ done
//! └──────────────┘      └──────┬───────┘
//!                              │ on failure: retry or DLQ
//!                       pipeline:email:retry / pipeline:email:dlq
//! ```

pub mod completion;
pub mod config;
pub mod entity;
pub mod error;
pub mod executor;
pub mod models;
pub mod ports;
pub mod repository;
pub mod streams;
pub mod submitter;

pub use completion::{EmailCompletionHandler, StoryCompletionHandler};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use executor::{EmailExecutor, StoryExecutor, StoryOutput};
pub use models::{CreateStoryRequest, CreateStoryResponse, Job, JobStatus, PersistedJobRecord, Story};
pub use ports::{
    AiStoryGenerator, EmailSender, HttpAiStoryGenerator, MockAiStoryGenerator, MockEmailSender,
    SendGridEmailSender, SharedAiStoryGenerator, SharedEmailSender,
};
pub use repository::{InMemoryRelationalStore, PgRelationalStore, RelationalStore};
pub use streams::{EmailStream, StoryStream};
pub use submitter::{create_story_handler, StageSubmitter};

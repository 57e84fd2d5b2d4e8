//! Stream Worker — generic Redis Streams engine for multi-stage job pipelines.
//!
//! A reusable library providing the six components a pipeline stage is built
//! from:
//! - `StreamTaskHandler` (C1) — the Redis wire protocol: append, read, ack,
//!   delete, schedule/reenqueue delayed retries, DLQ, claim abandoned entries.
//! - `JobExecutor` (C2) — a stage's business logic.
//! - `JobCompletionHandler` (C3) — a stage's side-effect policy: what happens
//!   to a job after it executes (ack, hand off to the next stage, retry, DLQ).
//! - `StageWorkerPool` (C4) — runs N workers driving C1→C2→C3 for one stage.
//! - `RetryScheduler` (C5) — sweeps due delayed retries back onto their stream.
//!
//! A pipeline's submitter (C6) appends the first job of a stage directly
//! through `StreamTaskHandler::append`/`append_to`.
//!
//! Also ambient: Prometheus metrics, a dead-letter queue manager, and Axum
//! health/admin routers.
//!
//! # Architecture
//!
//! ```text
//! Submitter ──append──▶ Redis Stream ◀──reenqueue_due── RetryScheduler
//!                             │                               ▲
//!                    StreamTaskHandler (C1)                    │
//!                             │                       schedule_retry
//!                     StageWorkerPool (C4)                     │
//!                   ┌─────────┴─────────┐                     │
//!             JobExecutor (C2)   JobCompletionHandler (C3) ───┘
//!                                        │
//!                                   DLQ Stream
//! ```

mod config;
pub mod dlq;
mod error;
mod handler;
mod health;
pub mod metrics;
mod pool;
mod registry;
mod scheduler;

pub use config::WorkerConfig;
pub use error::{retry_delay, ErrorCategory, RetryStrategy, StreamError};
pub use handler::{ReadEntry, StreamTaskHandler};
pub use health::{
    dlq_admin_router,
    dlq_delete_one_handler,
    dlq_get_handler,
    dlq_list_handler,
    dlq_purge_handler,
    dlq_reprocess_batch_handler,
    dlq_reprocess_one_handler,
    dlq_stats_handler,
    full_admin_router,
    health_handler,
    health_router,
    metrics_handler,
    ready_handler,
    stream_info_handler,
    HealthState,
};
pub use pool::StageWorkerPool;
pub use registry::{JobCompletionHandler, JobExecutor, StreamDef, StreamJob};
pub use scheduler::RetryScheduler;

/// Result type alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

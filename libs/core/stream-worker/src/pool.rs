//! `StageWorkerPool` — the C4 component: a pool of workers that drive one
//! pipeline stage's read → execute → complete cycle.
//!
//! A pool owns no business logic and no side-effect policy; it wires a
//! `StreamTaskHandler` (C1), a `JobExecutor` (C2) and a `JobCompletionHandler`
//! (C3) together and runs `worker_count` independent copies of the loop
//! concurrently, the way the teacher's `StreamWorker` ran one.

use crate::handler::StreamTaskHandler;
use crate::metrics::{self, ErrorType, JobStatus};
use crate::registry::{JobCompletionHandler, JobExecutor, StreamJob};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Runs `worker_count` concurrent workers against a single pipeline stage.
pub struct StageWorkerPool<J, E, C>
where
    J: StreamJob,
    E: JobExecutor<J>,
    C: JobCompletionHandler<J, E::Output>,
{
    handler: Arc<StreamTaskHandler>,
    executor: Arc<E>,
    completion: Arc<C>,
    worker_count: usize,
    _phantom: std::marker::PhantomData<J>,
}

impl<J, E, C> StageWorkerPool<J, E, C>
where
    J: StreamJob + 'static,
    E: JobExecutor<J> + 'static,
    C: JobCompletionHandler<J, E::Output> + 'static,
{
    pub fn new(handler: StreamTaskHandler, executor: E, completion: C, worker_count: usize) -> Self {
        Self {
            handler: Arc::new(handler),
            executor: Arc::new(executor),
            completion: Arc::new(completion),
            worker_count: worker_count.max(1),
            _phantom: std::marker::PhantomData,
        }
    }

    pub fn handler(&self) -> &StreamTaskHandler {
        &self.handler
    }

    /// Run the pool until `shutdown` reports `true`.
    ///
    /// Ensures the consumer group exists and claims this stage's abandoned
    /// pending entries before spawning `worker_count` independent loops, then
    /// waits for all of them to stop.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), crate::error::StreamError> {
        info!(
            stream = %self.handler.config().stream_name,
            group = %self.handler.config().consumer_group,
            executor = %self.executor.name(),
            workers = %self.worker_count,
            "starting stage worker pool"
        );

        self.handler.ensure_consumer_group().await?;
        if let Err(e) = self.handler.claim_abandoned(0).await {
            warn!(error = %e, "failed to claim pending entries on startup");
        }

        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_idx in 0..self.worker_count {
            let handler = self.handler.clone();
            let executor = self.executor.clone();
            let completion = self.completion.clone();
            let mut shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                Self::worker_loop(worker_idx, handler, executor, completion, &mut shutdown).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "stage worker task panicked");
            }
        }

        info!(stream = %self.handler.config().stream_name, "stage worker pool stopped");
        Ok(())
    }

    async fn worker_loop(
        worker_idx: usize,
        handler: Arc<StreamTaskHandler>,
        executor: Arc<E>,
        completion: Arc<C>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let claim_interval = Duration::from_millis(handler.config().claim_idle_ms * 2);
        let mut last_claim = std::time::Instant::now();
        let mut consecutive_errors: u32 = 0;
        const MAX_BACKOFF_SECS: u64 = 30;

        loop {
            if *shutdown.borrow() {
                debug!(worker = worker_idx, "stopping stage worker");
                break;
            }

            match Self::process_batch(&handler, &executor, &completion).await {
                Ok(processed) => {
                    consecutive_errors = 0;
                    if processed == 0 {
                        // BLOCK already spent the wait; loop straight back to read again.
                        continue;
                    }
                }
                Err(e) => {
                    if e.is_block_timeout() {
                        continue;
                    }

                    consecutive_errors += 1;

                    if e.is_nogroup_error() {
                        warn!(worker = worker_idx, "consumer group missing, recreating");
                        if let Err(create_err) = handler.ensure_consumer_group().await {
                            error!(error = %create_err, "failed to recreate consumer group");
                        }
                    } else if e.is_connection_error() {
                        let backoff = std::cmp::min(2u64.pow(consecutive_errors.min(5)), MAX_BACKOFF_SECS);
                        warn!(worker = worker_idx, error = %e, backoff_secs = backoff, "redis connection error, backing off");
                        tokio::time::sleep(Duration::from_secs(backoff)).await;
                    } else {
                        error!(worker = worker_idx, error = %e, "error processing batch");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                    continue;
                }
            }

            if last_claim.elapsed() >= claim_interval {
                if let Err(e) = handler.claim_abandoned(handler.config().claim_idle_ms).await {
                    debug!(error = %e, "error claiming abandoned entries");
                }
                last_claim = std::time::Instant::now();
            }
        }
    }

    /// Read, execute and complete one batch. Returns the number of entries processed.
    async fn process_batch(
        handler: &StreamTaskHandler,
        executor: &E,
        completion: &C,
    ) -> Result<usize, crate::error::StreamError> {
        let stream_name = &handler.config().stream_name;
        let batch_timer = metrics::MetricsTimer::new(stream_name.clone(), "batch");

        let pending = handler.read_pending::<J>().await?;
        let fresh = handler.read_new::<J>().await?;
        let entries: Vec<_> = pending.into_iter().chain(fresh).collect();

        if entries.is_empty() {
            drop(batch_timer);
            return Ok(0);
        }

        for entry in &entries {
            Self::process_one(handler, executor, completion, &entry.stream_id, &entry.job).await;
        }

        metrics::record_batch_size(stream_name, entries.len());
        drop(batch_timer);
        Ok(entries.len())
    }

    async fn process_one(
        handler: &StreamTaskHandler,
        executor: &E,
        completion: &C,
        stream_id: &str,
        job: &J,
    ) {
        let stream_name = &handler.config().stream_name;

        let start = std::time::Instant::now();
        match executor.execute(job).await {
            Ok(output) => {
                metrics::record_job_processed(stream_name, JobStatus::Success);
                metrics::record_job_duration(stream_name, "execute", start.elapsed());

                if let Err(e) = completion.on_success(handler, stream_id, job, output).await {
                    error!(stream_id, job_id = %job.job_id(), error = %e, "completion handler failed on success path");
                }
            }
            Err(e) => {
                let category = e.category();
                let error_type = match category {
                    crate::error::ErrorCategory::Transient => ErrorType::Transient,
                    crate::error::ErrorCategory::Permanent => ErrorType::Permanent,
                    crate::error::ErrorCategory::RateLimited => ErrorType::RateLimited,
                };
                metrics::record_job_processed(stream_name, JobStatus::Failed);
                metrics::record_error(stream_name, error_type);

                warn!(stream_id, job_id = %job.job_id(), error = %e, error_category = ?category, "job execution failed");

                if let Err(handler_err) = completion.on_failure(handler, stream_id, job, e).await {
                    error!(stream_id, error = %handler_err, "completion handler failed on failure path");
                    let _ = handler.ack(stream_id).await;
                }
            }
        }
    }
}

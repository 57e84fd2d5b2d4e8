//! `RetryScheduler` — the C5 component: periodically moves due jobs out of a
//! stage's retry sorted set and back onto its live stream.
//!
//! This has no equivalent in the teacher, which retried by re-appending to
//! the stream immediately. Delayed retry needs something to actually wake up
//! and notice a job has become due.

use crate::error::StreamError;
use crate::handler::StreamTaskHandler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Ticks on a fixed interval, sweeping one or more stages' retry sets.
pub struct RetryScheduler {
    handlers: Vec<Arc<StreamTaskHandler>>,
    tick_interval: Duration,
}

impl RetryScheduler {
    /// `tick_interval` controls how promptly a due retry is re-enqueued;
    /// it trades latency against Redis load, not correctness — `reenqueue_due`
    /// only moves jobs whose score has already passed.
    pub fn new(handlers: Vec<Arc<StreamTaskHandler>>, tick_interval: Duration) -> Self {
        Self {
            handlers,
            tick_interval,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        info!(
            stages = self.handlers.len(),
            interval_ms = %self.tick_interval.as_millis(),
            "starting retry scheduler"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            for handler in &self.handlers {
                match handler.reenqueue_due().await {
                    Ok(0) => {}
                    Ok(n) => info!(stream = %handler.config().stream_name, count = n, "re-enqueued due retries"),
                    Err(e) => {
                        debug!(stream = %handler.config().stream_name, error = %e, "retry sweep failed")
                    }
                }
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        info!("retry scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_with_handlers() {
        let scheduler = RetryScheduler::new(vec![], Duration::from_secs(5));
        assert_eq!(scheduler.handlers.len(), 0);
    }
}

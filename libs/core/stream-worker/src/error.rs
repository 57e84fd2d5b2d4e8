//! Error types for stream operations.
//!
//! - `StreamError` — the error type threaded through every engine operation.
//! - `ErrorCategory` / `RetryStrategy` — classification used to decide whether an
//!   error from a `JobExecutor` is worth retrying at all.
//! - `retry_delay` — the exponential-backoff-with-jitter formula used by the
//!   retry scheduler (C5) to compute when a scheduled retry becomes due.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during stream operations.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Redis connection or command error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Job processing error from a `JobExecutor`.
    #[error("Processing error: {0}")]
    Processing(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stream/queue operation error.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Consumer group error.
    #[error("Consumer group error: {0}")]
    ConsumerGroup(String),

    /// Job parsing error (malformed message on the wire).
    #[error("Job parsing error: {0}")]
    JobParsing(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Health check failed.
    #[error("Health check failed: {0}")]
    HealthCheck(String),

    /// Timeout error.
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl StreamError {
    /// True when this is a `BLOCK` timeout from `XREADGROUP` — normal behavior,
    /// not an error condition.
    pub fn is_block_timeout(&self) -> bool {
        match self {
            Self::Redis(e) => {
                let err_str = e.to_string().to_lowercase();
                err_str.contains("timed out") && !err_str.contains("connection")
            }
            _ => false,
        }
    }

    /// True for connection-level failures that are likely transient.
    pub fn is_connection_error(&self) -> bool {
        if self.is_block_timeout() {
            return false;
        }
        match self {
            Self::Redis(e) => {
                let err_str = e.to_string().to_lowercase();
                err_str.contains("connection")
                    || err_str.contains("disconnected")
                    || err_str.contains("broken pipe")
                    || err_str.contains("reset by peer")
                    || err_str.contains("refused")
                    || err_str.contains("eof")
                    || err_str.contains("io error")
            }
            Self::Queue(s) | Self::Internal(s) => {
                let lower = s.to_lowercase();
                lower.contains("connection") && !lower.contains("block")
            }
            _ => false,
        }
    }

    /// True when a consumer group is missing (`NOGROUP`) and needs recreating.
    pub fn is_nogroup_error(&self) -> bool {
        match self {
            Self::Redis(e) => e.to_string().contains("NOGROUP"),
            Self::ConsumerGroup(s) | Self::Queue(s) => s.contains("NOGROUP"),
            _ => false,
        }
    }

    /// Categorize the error for smart retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Redis(e) => {
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("busy") || err_str.contains("loading") {
                    ErrorCategory::RateLimited
                } else {
                    ErrorCategory::Transient
                }
            }
            Self::Queue(_) | Self::Internal(_) | Self::Timeout(_) | Self::ConsumerGroup(_)
            | Self::HealthCheck(_) => ErrorCategory::Transient,
            Self::Serialization(_) | Self::JobParsing(_) | Self::Config(_) => {
                ErrorCategory::Permanent
            }
            Self::Processing(s) => {
                let lower = s.to_lowercase();
                if lower.contains("rate")
                    || lower.contains("limit")
                    || lower.contains("quota")
                    || lower.contains("throttl")
                    || lower.contains("429")
                {
                    ErrorCategory::RateLimited
                } else if lower.contains("invalid")
                    || lower.contains("malformed")
                    || lower.contains("not found")
                    || lower.contains("forbidden")
                    || lower.contains("unauthorized")
                    || lower.contains("401")
                    || lower.contains("403")
                    || lower.contains("404")
                {
                    ErrorCategory::Permanent
                } else {
                    ErrorCategory::Transient
                }
            }
        }
    }
}

/// Error category for smart retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary error — retry with backoff.
    Transient,
    /// Won't be fixed by retrying — send straight to DLQ.
    Permanent,
    /// Upstream is overloaded — retry, but with a longer backoff.
    RateLimited,
}

impl ErrorCategory {
    pub fn should_retry(&self) -> bool {
        !matches!(self, Self::Permanent)
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        match self {
            Self::Transient => RetryStrategy::Backoff {
                base_ms: 2_000,
                max_ms: 300_000,
            },
            Self::Permanent => RetryStrategy::NoRetry,
            Self::RateLimited => RetryStrategy::Backoff {
                base_ms: 5_000,
                max_ms: 300_000,
            },
        }
    }
}

/// Retry strategy for handling errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    NoRetry,
    Backoff { base_ms: u64, max_ms: u64 },
}

impl RetryStrategy {
    pub fn should_retry(&self) -> bool {
        !matches!(self, Self::NoRetry)
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::NoRetry => None,
            Self::Backoff { base_ms, max_ms } => Some(retry_delay(attempt, *base_ms, *max_ms)),
        }
    }
}

/// Exponential backoff with full jitter:
///
/// ```text
/// delay(n) = uniform(0, min(base * 2^n, max))
/// ```
///
/// `n` is the zero-based retry attempt. Used by the retry scheduler to compute
/// the `run_at` timestamp stored alongside a job in the retry set.
pub fn retry_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = base_ms.saturating_mul(1u64 << attempt.min(32));
    let capped = exp.min(max_ms);
    if capped == 0 {
        return Duration::from_millis(0);
    }
    let jittered = rand::thread_rng().gen_range(0..=capped);
    Duration::from_millis(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StreamError::Processing("failed to send email".to_string());
        assert_eq!(err.to_string(), "Processing error: failed to send email");
    }

    #[test]
    fn test_error_category_permanent() {
        let err = StreamError::JobParsing("invalid json".to_string());
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(!err.category().should_retry());
    }

    #[test]
    fn test_error_category_rate_limited() {
        let err = StreamError::Processing("429 too many requests".to_string());
        assert_eq!(err.category(), ErrorCategory::RateLimited);
    }

    #[test]
    fn retry_delay_never_exceeds_cap() {
        for attempt in 0..20 {
            let d = retry_delay(attempt, 2_000, 300_000);
            assert!(d.as_millis() <= 300_000);
        }
    }

    #[test]
    fn retry_delay_grows_with_attempt_cap() {
        // the cap grows exponentially even though individual samples are random
        let cap_0 = 2_000u64.saturating_mul(1 << 0).min(300_000);
        let cap_5 = 2_000u64.saturating_mul(1 << 5).min(300_000);
        assert!(cap_5 > cap_0);
    }

    #[test]
    fn no_retry_strategy_never_yields_a_delay() {
        assert_eq!(RetryStrategy::NoRetry.delay_for_attempt(0), None);
        assert!(!RetryStrategy::NoRetry.should_retry());
    }
}

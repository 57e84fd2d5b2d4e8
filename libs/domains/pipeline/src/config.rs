//! Environment-driven configuration for the pipeline's worker counts,
//! retry policy and executor timeout. Redis/Postgres connection settings are
//! loaded separately via `database::redis::RedisConfig` /
//! `database::postgres::PostgresConfig`, the way the other binaries in this
//! workspace do it.

use core_config::{env_or_default, ConfigError, FromEnv};

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::ParseError {
            key: key.to_string(),
            details: format!("expected a value parseable from '{raw}'"),
        }),
        Err(_) => Ok(default),
    }
}

/// Tunables shared by both stages' worker binaries and the retry scheduler.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub story_workers: usize,
    pub email_workers: usize,
    pub scheduler_workers: usize,
    pub retry_max: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub executor_timeout_ms: u64,
    pub scheduler_tick_ms: u64,
    pub health_port: u16,
}

impl FromEnv for PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            story_workers: env_parsed("STORY_WORKERS", 4)?,
            email_workers: env_parsed("EMAIL_WORKERS", 4)?,
            scheduler_workers: env_parsed("SCHEDULER_WORKERS", 1)?,
            retry_max: env_parsed("RETRY_MAX", 5)?,
            backoff_base_ms: env_parsed("BACKOFF_BASE_MS", 2_000)?,
            backoff_max_ms: env_parsed("BACKOFF_MAX_MS", 300_000)?,
            executor_timeout_ms: env_parsed("EXECUTOR_TIMEOUT_MS", 30_000)?,
            scheduler_tick_ms: env_parsed("SCHEDULER_TICK_MS", 1_000)?,
            health_port: env_parsed("HEALTH_PORT", 8080)?,
        })
    }
}

impl PipelineConfig {
    /// HTTP bind host for the API binary, defaulting to all interfaces.
    pub fn host() -> String {
        env_or_default("HOST", "0.0.0.0")
    }

    pub fn port() -> Result<u16, ConfigError> {
        env_parsed("PORT", 3000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_unset() {
        temp_env::with_vars_unset(
            [
                "STORY_WORKERS",
                "EMAIL_WORKERS",
                "SCHEDULER_WORKERS",
                "RETRY_MAX",
                "BACKOFF_BASE_MS",
                "BACKOFF_MAX_MS",
                "EXECUTOR_TIMEOUT_MS",
                "SCHEDULER_TICK_MS",
                "HEALTH_PORT",
            ],
            || {
                let config = PipelineConfig::from_env().unwrap();
                assert_eq!(config.story_workers, 4);
                assert_eq!(config.retry_max, 5);
                assert_eq!(config.backoff_base_ms, 2_000);
            },
        );
    }

    #[test]
    fn invalid_value_is_a_parse_error() {
        temp_env::with_var("STORY_WORKERS", Some("not-a-number"), || {
            let err = PipelineConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { .. }));
        });
    }
}

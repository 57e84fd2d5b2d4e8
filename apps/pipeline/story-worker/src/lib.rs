//! Story Worker Service
//!
//! Consumes `pipeline:story`, runs the AI story generator, and hands
//! successful jobs off to `pipeline:email`.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (pipeline:story)
//!   ↓ (Consumer Group: story_workers)
//! StageWorkerPool<Job, StoryExecutor, StoryCompletionHandler>
//!   ↓ (generates story content)
//! PostgreSQL (stories, story_jobs)
//!   ↓ (on success)
//! Redis Stream (pipeline:email)
//! ```

use core_config::{Environment, FromEnv};
use database::{
    postgres::{connect_from_config_with_retry as connect_postgres, PostgresConfig},
    redis::{connect_from_config_with_retry as connect_redis, RedisConfig},
};
use domain_pipeline::{
    HttpAiStoryGenerator, PgRelationalStore, PipelineConfig, StoryCompletionHandler, StoryExecutor,
    StoryStream,
};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{
    full_admin_router, metrics, HealthState, RetryScheduler, StageWorkerPool, StreamDef,
    StreamTaskHandler, WorkerConfig,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

async fn start_health_server(health_state: HealthState, port: u16) -> Result<()> {
    let app = full_admin_router(health_state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind health server to {addr}"))?;

    info!(port = %port, "health and admin server listening");
    axum::serve(listener, app).await.wrap_err("health server failed")?;
    Ok(())
}

pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    metrics::init_metrics();

    let app_name = env!("CARGO_PKG_NAME");
    let app_version = env!("CARGO_PKG_VERSION");
    info!(name = app_name, version = app_version, "starting story worker service");

    let pipeline_config = PipelineConfig::from_env().wrap_err("failed to load pipeline configuration")?;

    let pg_config = PostgresConfig::from_env().wrap_err("failed to load PostgreSQL configuration")?;
    let db = connect_postgres(pg_config, None)
        .await
        .wrap_err("failed to connect to PostgreSQL")?;

    let redis_config = RedisConfig::from_env().wrap_err("failed to load Redis configuration")?;
    let redis = connect_redis(redis_config, None)
        .await
        .wrap_err("failed to connect to Redis")?;

    let worker_config = WorkerConfig::from_stream_def::<StoryStream>()
        .with_block_timeout_ms(1000)
        .with_batch_size(StoryStream::BATCH_SIZE)
        .with_backoff(pipeline_config.backoff_base_ms, pipeline_config.backoff_max_ms)
        .with_max_retries(pipeline_config.retry_max);

    let store = Arc::new(PgRelationalStore::new(db));
    let generator: domain_pipeline::SharedAiStoryGenerator =
        Arc::new(HttpAiStoryGenerator::from_env().wrap_err("failed to load AI generator configuration")?);

    let executor = StoryExecutor::new(generator, store.clone());
    let completion = StoryCompletionHandler::new(store);

    let handler = StreamTaskHandler::new(redis.clone(), worker_config.clone());
    let scheduler_handlers: Vec<_> = (0..pipeline_config.scheduler_workers)
        .map(|_| Arc::new(StreamTaskHandler::new(redis.clone(), worker_config.clone())))
        .collect();

    let pool = StageWorkerPool::new(handler, executor, completion, pipeline_config.story_workers);
    let scheduler = RetryScheduler::new(
        scheduler_handlers,
        Duration::from_millis(pipeline_config.scheduler_tick_ms),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("error waiting for shutdown signal: {e}");
        }
        let _ = shutdown_tx.send(true);
    });

    let health_state = HealthState::new(
        Arc::new(redis),
        app_name,
        app_version,
        worker_config.stream_name.clone(),
    );
    let health_state_clone = health_state.clone();
    let health_port = pipeline_config.health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state_clone, health_port).await {
            error!(error = %e, "health server failed");
        }
    });

    let scheduler_shutdown = shutdown_rx.clone();
    let scheduler_task = tokio::spawn(async move {
        if let Err(e) = scheduler.run(scheduler_shutdown).await {
            error!(error = %e, "retry scheduler stopped with error");
        }
    });

    pool.run(shutdown_rx).await.map_err(|e| eyre::eyre!("{e}"))?;
    let _ = scheduler_task.await;

    info!("story worker service stopped");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, initiating shutdown..."); },
        _ = terminate => { info!("received SIGTERM, initiating shutdown..."); },
    }

    Ok(())
}

//! Pipeline API Service
//!
//! The HTTP front door for the pipeline: accepts `POST /stories`, persists a
//! `pending` story job row, and appends it to the story stream for the
//! story-worker to pick up.
//!
//! ## Architecture
//!
//! ```text
//! POST /stories
//!   ↓
//! StageSubmitter
//!   ↓ (writes story_jobs row, status = pending)
//! PostgreSQL
//!   ↓ (appends Job)
//! Redis Stream (pipeline:story)
//! ```

use axum::routing::post;
use axum::Router;
use core_config::{Environment, FromEnv};
use database::{
    postgres::{connect_from_config_with_retry as connect_postgres, PostgresConfig},
    redis::{connect_from_config_with_retry as connect_redis, RedisConfig},
};
use domain_pipeline::{create_story_handler, PgRelationalStore, PipelineConfig, StageSubmitter, StoryStream};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use stream_worker::{full_admin_router, metrics, HealthState, StreamTaskHandler, WorkerConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

async fn start_health_server(health_state: HealthState, port: u16) -> Result<()> {
    let app: Router = full_admin_router(health_state);
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
    info!(name = app_name, version = app_version, "starting pipeline API service");

    let pipeline_config = PipelineConfig::from_env().wrap_err("failed to load pipeline configuration")?;

    let pg_config = PostgresConfig::from_env().wrap_err("failed to load PostgreSQL configuration")?;
    let db = connect_postgres(pg_config, None)
        .await
        .wrap_err("failed to connect to PostgreSQL")?;

    let redis_config = RedisConfig::from_env().wrap_err("failed to load Redis configuration")?;
    let redis = connect_redis(redis_config, None)
        .await
        .wrap_err("failed to connect to Redis")?;

    let worker_config = WorkerConfig::from_stream_def::<StoryStream>();
    let handler = Arc::new(StreamTaskHandler::new(redis.clone(), worker_config.clone()));
    handler
        .ensure_consumer_group()
        .await
        .map_err(|e| eyre::eyre!("{e}"))?;

    let store = Arc::new(PgRelationalStore::new(db));
    let submitter = Arc::new(StageSubmitter::new(store, handler));

    let app = Router::new()
        .route("/stories", post(create_story_handler))
        .with_state(submitter);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
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
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state_clone, pipeline_config.health_port).await {
            error!(error = %e, "health server failed");
        }
    });

    let port = PipelineConfig::port().wrap_err("invalid PORT")?;
    let addr = format!("{}:{}", PipelineConfig::host(), port);
    let listener = TcpListener::bind(&addr)
        .await
        .wrap_err_with(|| format!("failed to bind API server to {addr}"))?;
    info!(addr = %addr, "pipeline API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
        .wrap_err("API server failed")?;
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

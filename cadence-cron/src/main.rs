//! cadence-cron - HTTP trigger service for scheduled work
//!
//! Exposes the three cron entry points as GET endpoints, each gated by a
//! bearer-token shared secret:
//!
//!   GET /cron/generate  - run due pipelines (content generation)
//!   GET /cron/publish   - publish due posts (+ image backfill)
//!   GET /cron/retry     - reattempt failed posts within retry bounds
//!
//! Endpoints return a success envelope with per-item outcomes even when some
//! items failed; only systemic failures produce a top-level error response.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

use libcadence::ai::{build_content_generator, build_image_generator};
use libcadence::platforms::AdapterRegistry;
use libcadence::publisher::{PublishOptions, Publisher};
use libcadence::runner::PipelineRunner;
use libcadence::storage::LocalImageStore;
use libcadence::{Config, Database};

#[derive(Parser, Debug)]
#[command(name = "cadence-cron")]
#[command(version)]
#[command(about = "HTTP trigger service for scheduled generation and publishing")]
struct Cli {
    /// Path to the config file (overrides CADENCE_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,
}

struct AppState {
    runner: PipelineRunner,
    publisher: Publisher,
    secret: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    libcadence::logging::init_default();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    // Missing shared secret is a configuration error: refuse to start
    // rather than serve unauthenticated triggers.
    let secret = config.cron_secret()?.to_string();

    let db = Database::new(&config.database.path).await?;
    let http = reqwest::Client::new();

    let runner = PipelineRunner::new(db.clone(), build_content_generator(&config.ai)?);
    let publisher = Publisher::new(
        db.clone(),
        AdapterRegistry::standard(http, db.clone(), &config.twitter),
        build_image_generator(&config.ai)?,
        Box::new(LocalImageStore::from_config(&config.images)),
        PublishOptions::from(&config.publishing),
    );

    let state = Arc::new(AppState {
        runner,
        publisher,
        secret,
    });

    let app = Router::new()
        .route("/cron/generate", get(generate_handler))
        .route("/cron/publish", get(publish_handler))
        .route("/cron/retry", get(retry_handler))
        .with_state(state);

    let bind = cli.bind.unwrap_or(config.cron.bind);
    info!("cadence-cron listening on {}", bind);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Compare the Authorization header against the shared secret. Rejects
/// before any core logic runs.
fn authorized(headers: &HeaderMap, secret: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {}", secret))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized" })),
    )
        .into_response()
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message })),
    )
        .into_response()
}

/// Wrap a scan report in the success envelope.
fn envelope<T: Serialize>(report: &T) -> Response {
    match serde_json::to_value(report) {
        Ok(mut value) => {
            if let Some(object) = value.as_object_mut() {
                object.insert("success".to_string(), json!(true));
            }
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(e) => internal_error(e.to_string()),
    }
}

async fn generate_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state.secret) {
        return unauthorized();
    }

    let now = chrono::Utc::now().timestamp();
    match state.runner.run_due_pipelines(now).await {
        Ok(report) => envelope(&report),
        Err(e) => {
            error!("pipeline cron failed: {}", e);
            internal_error(e.to_string())
        }
    }
}

async fn publish_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state.secret) {
        return unauthorized();
    }

    let now = chrono::Utc::now().timestamp();
    match state.publisher.run_due_publishing(now).await {
        Ok(report) => envelope(&report),
        Err(e) => {
            error!("publish cron failed: {}", e);
            internal_error(e.to_string())
        }
    }
}

async fn retry_handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if !authorized(&headers, &state.secret) {
        return unauthorized();
    }

    let now = chrono::Utc::now().timestamp();
    match state.publisher.run_retries(now).await {
        Ok(report) => envelope(&report),
        Err(e) => {
            error!("retry cron failed: {}", e);
            internal_error(e.to_string())
        }
    }
}

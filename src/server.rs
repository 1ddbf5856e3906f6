//! HTTP control surface for a running recorder.
//!
//! This module provides an HTTP server that:
//! - Reports capabilities, status, the live window and recorded sessions
//! - Starts and stops recordings and switches the activity label
//! - Serves archive exports as file downloads
//!
//! # Architecture
//!
//! ```text
//! sources ──→ channel ──→ pump thread ──┐
//!                                        ├──→ Mutex<Pipeline>
//! UI ──→ HTTP handlers ─────────────────┘
//! ```
//!
//! The pump thread and the handlers share one lock, so sample processing and
//! commands are serialized exactly as in the single-threaded CLI loop.

use crate::collector::capability::SensorPlatform;
use crate::collector::system_platform;
use crate::config::Config;
use crate::core::event::SessionEntry;
use crate::core::export::{ExportError, ExportFormat};
use crate::core::recorder::{RecorderError, StopOutcome};
use crate::pipeline::{Pipeline, PipelineStatus};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// How often the pump thread drains the sample channel.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// Server configuration
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Recorder configuration
    pub config: Config,
    /// Sensor platform; the system platform when `None`
    pub platform: Option<Box<dyn SensorPlatform>>,
}

impl ServerConfig {
    pub fn new(port: u16, config: Config) -> Self {
        Self {
            port,
            config,
            platform: None,
        }
    }

    pub fn with_platform(mut self, platform: Box<dyn SensorPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }
}

/// Shared server state
pub struct ServerState {
    pipeline: Arc<Mutex<Pipeline>>,
}

/// Body of `POST /recording/start`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRequest {
    pub activity: Option<String>,
}

/// Body of `POST /activity`
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRequest {
    pub activity: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityResponse {
    pub activity: String,
    /// Whether a switch marker was written into the open session
    pub marked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LiveQuery {
    pub limit: Option<usize>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub recording: bool,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        recording: state.pipeline.lock().is_recording(),
    })
}

/// GET /capabilities
async fn capabilities(State(state): State<Arc<ServerState>>) -> Response {
    let mut pipeline = state.pipeline.lock();
    Json(pipeline.refresh_capabilities().clone()).into_response()
}

/// GET /status
async fn status(State(state): State<Arc<ServerState>>) -> Json<PipelineStatus> {
    Json(state.pipeline.lock().status())
}

/// GET /live?limit=k
async fn live(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LiveQuery>,
) -> Json<Vec<SessionEntry>> {
    let pipeline = state.pipeline.lock();
    Json(match query.limit {
        Some(limit) => pipeline.live_snapshot(limit),
        None => pipeline.chart_snapshot(),
    })
}

/// GET /sessions
async fn sessions(State(state): State<Arc<ServerState>>) -> Response {
    Json(state.pipeline.lock().session_summaries()).into_response()
}

/// POST /recording/start
async fn start_recording(
    State(state): State<Arc<ServerState>>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<PipelineStatus>, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let mut pipeline = state.pipeline.lock();

    pipeline
        .start_recording(request.activity.as_deref())
        .map_err(|e| {
            let code = match e {
                RecorderError::NoActivity => "NO_ACTIVITY",
                RecorderError::AlreadyRecording => "ALREADY_RECORDING",
            };
            api_error(StatusCode::BAD_REQUEST, code, e)
        })?;

    Ok(Json(pipeline.status()))
}

/// POST /recording/stop
async fn stop_recording(State(state): State<Arc<ServerState>>) -> Json<StopResponse> {
    let outcome = state.pipeline.lock().stop_recording();
    Json(match outcome {
        StopOutcome::AlreadyIdle => StopResponse {
            outcome: "already_idle",
            session_id: None,
            entries: None,
        },
        StopOutcome::Discarded => StopResponse {
            outcome: "discarded",
            session_id: None,
            entries: None,
        },
        StopOutcome::Sealed { id, entries } => StopResponse {
            outcome: "sealed",
            session_id: Some(id),
            entries: Some(entries),
        },
    })
}

/// POST /activity
async fn switch_activity(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ActivityRequest>,
) -> Result<Json<ActivityResponse>, ApiError> {
    if request.activity.trim().is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "INVALID_ACTIVITY",
            "activity must not be empty",
        ));
    }

    let mut pipeline = state.pipeline.lock();
    let marked = pipeline.switch_activity(&request.activity);
    Ok(Json(ActivityResponse {
        activity: pipeline.current_activity().to_string(),
        marked,
    }))
}

/// GET /export/:format
async fn export(
    State(state): State<Arc<ServerState>>,
    Path(format): Path<String>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = format
        .parse()
        .map_err(|e: String| api_error(StatusCode::BAD_REQUEST, "INVALID_FORMAT", e))?;

    let artifact = state.pipeline.lock().export(format).map_err(|e| match e {
        ExportError::EmptyArchive => api_error(StatusCode::NOT_FOUND, "EMPTY_ARCHIVE", e),
        other => {
            tracing::error!("Export failed: {}", other);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_ERROR", other)
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.filename),
            ),
        ],
        artifact.content,
    )
        .into_response())
}

/// Build the router around an existing pipeline.
pub fn router(pipeline: Arc<Mutex<Pipeline>>) -> Router {
    let state = Arc::new(ServerState { pipeline });

    Router::new()
        .route("/health", get(health))
        .route("/capabilities", get(capabilities))
        .route("/status", get(status))
        .route("/live", get(live))
        .route("/sessions", get(sessions))
        .route("/recording/start", post(start_recording))
        .route("/recording/stop", post(stop_recording))
        .route("/activity", post(switch_activity))
        .route("/export/:format", get(export))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Drain the sample channel until `running` is cleared.
fn spawn_pump(
    pipeline: Arc<Mutex<Pipeline>>,
    running: Arc<AtomicBool>,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("pipeline-pump".to_string())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                pipeline.lock().process_pending();
                std::thread::sleep(PUMP_INTERVAL);
            }
        })
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    config.config.validate()?;

    let platform = config.platform.unwrap_or_else(system_platform);
    let pipeline = Arc::new(Mutex::new(Pipeline::new(config.config, platform)));

    let running = Arc::new(AtomicBool::new(true));
    let pump = spawn_pump(Arc::clone(&pipeline), Arc::clone(&running))?;

    let app = router(Arc::clone(&pipeline));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Motion recorder server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }

        running.store(false, Ordering::SeqCst);
        let _ = tokio::task::spawn_blocking(move || {
            if pump.join().is_err() {
                tracing::warn!("pipeline pump thread panicked");
            }
            pipeline.lock().stop_recording();
        })
        .await;
    });

    Ok((actual_addr, shutdown_tx))
}

//! REST API handlers for the admin server

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::metrics;
use crate::models::MonitoredTarget;
use crate::utils::error::CommandError;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Add-target request
#[derive(Debug, Deserialize)]
pub struct AddTargetRequest {
    pub name: Option<String>,
    pub url: String,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/targets", get(list_targets).post(add_target))
        .route("/api/targets/{name}", delete(remove_target))
        .route("/api/check", post(run_check))
        .route("/metrics", get(export_metrics))
        .with_state(state)
}

fn respond<T: Serialize>(endpoint: &str, status: StatusCode, body: ApiResponse<T>) -> Response {
    metrics::record_api_request(endpoint, status.as_u16());
    (status, Json(body)).into_response()
}

fn command_error(endpoint: &str, error: CommandError) -> Response {
    let status = match error {
        CommandError::DuplicateName(_) | CommandError::DuplicateUrl(_) => StatusCode::CONFLICT,
        CommandError::UnknownTarget(_) => StatusCode::NOT_FOUND,
        CommandError::Usage(_) | CommandError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
    };
    respond(endpoint, status, ApiResponse::error(error.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Response {
    let uptime = state.start_time.elapsed().as_secs();

    respond(
        "/api/health",
        StatusCode::OK,
        ApiResponse::success(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
        }),
    )
}

/// Monitor status with per-target state
async fn get_status(State(state): State<AppState>) -> Response {
    let status = state.monitor.table().read().await.status();
    respond("/api/status", StatusCode::OK, ApiResponse::success(status))
}

async fn list_targets(State(state): State<AppState>) -> Response {
    let targets: Vec<MonitoredTarget> = state.monitor.table().read().await.targets().to_vec();
    respond("/api/targets", StatusCode::OK, ApiResponse::success(targets))
}

async fn add_target(
    State(state): State<AppState>,
    Json(request): Json<AddTargetRequest>,
) -> Response {
    let result = state
        .monitor
        .table()
        .write()
        .await
        .add_target(request.name.as_deref(), &request.url);

    match result {
        Ok(target) => respond("/api/targets", StatusCode::CREATED, ApiResponse::success(target)),
        Err(e) => command_error("/api/targets", e),
    }
}

async fn remove_target(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let result = state.monitor.table().write().await.remove_target(&name);

    match result {
        Ok(target) => respond("/api/targets/{name}", StatusCode::OK, ApiResponse::success(target)),
        Err(e) => command_error("/api/targets/{name}", e),
    }
}

/// Run a cycle now and return its report
async fn run_check(State(state): State<AppState>) -> Response {
    let report = state.monitor.run_cycle().await;
    respond("/api/check", StatusCode::OK, ApiResponse::success(report))
}

/// Prometheus text exposition
async fn export_metrics() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

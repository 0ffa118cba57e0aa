use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::SchedulerError;
use crate::scheduler::{JobId, JobStatus, DEFAULT_PRIORITY};
use crate::service::JobService;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<JobService>,
}

#[derive(Deserialize)]
pub struct CreateJobRequest {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_priority")]
    priority: i64,
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY as i64
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    status: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let status = match &self {
            SchedulerError::JobNotFound(_) => StatusCode::NOT_FOUND,
            SchedulerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SchedulerError::NotRunning | SchedulerError::AlreadyRunning => StatusCode::CONFLICT,
            SchedulerError::Persistence(_) | SchedulerError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// Malformed paths and bodies are client errors and get the same JSON error
// body as every other failure, always as 400.
impl From<JsonRejection> for SchedulerError {
    fn from(rejection: JsonRejection) -> Self {
        SchedulerError::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for SchedulerError {
    fn from(rejection: PathRejection) -> Self {
        SchedulerError::InvalidInput(rejection.body_text())
    }
}

/// Routes for the job API.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/jobs", get(list_jobs_handler).post(create_job_handler))
        .route("/jobs/stats", get(stats_handler))
        .route("/jobs/:id", get(get_job_handler))
        .route("/jobs/:id/status", patch(update_status_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    state: ApiState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn create_job_handler(
    State(state): State<ApiState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SchedulerError> {
    let Json(payload) = payload?;
    let job = state
        .service
        .create_job(payload.title, payload.description, payload.priority)?;
    Ok(Json(job))
}

async fn list_jobs_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.list_jobs())
}

async fn stats_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.stats())
}

async fn get_job_handler(
    State(state): State<ApiState>,
    id: Result<Path<JobId>, PathRejection>,
) -> Result<impl IntoResponse, SchedulerError> {
    let Path(id) = id?;
    Ok(Json(state.service.get_job(id)?))
}

async fn update_status_handler(
    State(state): State<ApiState>,
    id: Result<Path<JobId>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse, SchedulerError> {
    let Path(id) = id?;
    let Json(payload) = payload?;
    let status: JobStatus = payload.status.parse()?;
    Ok(Json(state.service.update_job_status(id, status)?))
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::error::RenderError;
use crate::render::RenderRequest;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct DashboardState {
    pub scheduler: Arc<Scheduler>,
    /// Where `copy` puts images when the request names no destination
    pub default_dest: PathBuf,
}

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    job_id: Option<String>,
    error: Option<String>,
}

impl ActionResponse {
    fn ok(job_id: Uuid) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                job_id: Some(job_id.to_string()),
                error: None,
            }),
        )
    }

    fn failed(job_id: Option<Uuid>, err: RenderError) -> (StatusCode, Json<Self>) {
        let status = match err {
            RenderError::JobNotFound(_) => StatusCode::NOT_FOUND,
            RenderError::NotCompleted(_) => StatusCode::CONFLICT,
            RenderError::Configuration(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(Self {
                success: false,
                job_id: job_id.map(|id| id.to_string()),
                error: Some(err.to_string()),
            }),
        )
    }

    fn from_result(job_id: Uuid, result: crate::error::Result<()>) -> (StatusCode, Json<Self>) {
        match result {
            Ok(()) => Self::ok(job_id),
            Err(e) => Self::failed(Some(job_id), e),
        }
    }
}

#[derive(Serialize)]
struct HostResponse {
    host: String,
    jobs: usize,
    queued: usize,
    active: usize,
}

#[derive(Deserialize)]
struct CopyRequest {
    #[serde(default)]
    dest: Option<PathBuf>,
}

#[derive(Deserialize)]
struct ActivityRequest {
    active: bool,
}

#[derive(Serialize)]
struct ActivityResponse {
    interval_ms: u64,
}

/// Routes of the job API, without CORS.
pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/jobs", get(list_jobs_handler).post(submit_job_handler))
        .route("/api/jobs/{id}", get(get_job_handler).delete(withdraw_handler))
        .route("/api/jobs/{id}/pause", post(pause_handler))
        .route("/api/jobs/{id}/resume", post(resume_handler))
        .route("/api/jobs/{id}/kill", post(kill_handler))
        .route("/api/jobs/{id}/restart", post(restart_handler))
        .route("/api/jobs/{id}/copy", post(copy_handler))
        .route("/api/hosts", get(list_hosts_handler))
        .route("/api/activity", post(activity_handler))
        .with_state(state)
}

/// Serve the API on `addr` until `token` is cancelled.
pub async fn run_dashboard(addr: SocketAddr, state: DashboardState, token: CancellationToken) {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    tracing::info!(addr = %addr, "Starting dashboard server");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "Failed to bind dashboard server");
            return;
        }
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(token.cancelled_owned())
        .await;
    if let Err(e) = served {
        tracing::error!(error = %e, "Dashboard server failed");
    }
}

async fn list_jobs_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    Json(state.scheduler.snapshots().await)
}

async fn get_job_handler(
    State(state): State<DashboardState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.scheduler.snapshot(id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => ActionResponse::failed(Some(id), e).into_response(),
    }
}

async fn submit_job_handler(
    State(state): State<DashboardState>,
    Json(request): Json<RenderRequest>,
) -> impl IntoResponse {
    match state.scheduler.submit(request).await {
        Ok(id) => ActionResponse::ok(id),
        Err(e) => {
            tracing::warn!(error = %e, "Job submission rejected");
            ActionResponse::failed(None, e)
        }
    }
}

async fn pause_handler(
    State(state): State<DashboardState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ActionResponse::from_result(id, state.scheduler.pause(id).await)
}

async fn resume_handler(
    State(state): State<DashboardState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ActionResponse::from_result(id, state.scheduler.resume(id).await)
}

async fn kill_handler(
    State(state): State<DashboardState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ActionResponse::from_result(id, state.scheduler.kill(id).await)
}

async fn restart_handler(
    State(state): State<DashboardState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    match state.scheduler.restart(id).await {
        Ok(new_id) => ActionResponse::ok(new_id),
        Err(e) => ActionResponse::failed(Some(id), e),
    }
}

async fn copy_handler(
    State(state): State<DashboardState>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> impl IntoResponse {
    let requested = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice::<CopyRequest>(&body) {
            Ok(req) => req.dest,
            Err(e) => {
                let err = RenderError::Configuration(format!("invalid copy request: {}", e));
                return ActionResponse::failed(Some(id), err);
            }
        }
    };
    let dest = requested.unwrap_or_else(|| state.default_dest.clone());
    ActionResponse::from_result(id, state.scheduler.copy_output(id, &dest).await)
}

async fn withdraw_handler(
    State(state): State<DashboardState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ActionResponse::from_result(id, state.scheduler.withdraw(id).await)
}

async fn list_hosts_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let mut hosts = Vec::new();
    for host in state.scheduler.hosts().await {
        hosts.push(HostResponse {
            jobs: state.scheduler.jobs_on(&host).await,
            queued: state.scheduler.queued_ids(&host).await.len(),
            active: state.scheduler.active_on(&host).await,
            host,
        });
    }
    Json(hosts)
}

async fn activity_handler(
    State(state): State<DashboardState>,
    Json(request): Json<ActivityRequest>,
) -> impl IntoResponse {
    state.scheduler.set_activity(request.active);
    Json(ActivityResponse {
        interval_ms: state.scheduler.tick_interval().as_millis() as u64,
    })
}

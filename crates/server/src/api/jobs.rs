//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use mediarelay_core::job::{Job, JobRequest, JobStatus};
use mediarelay_core::SchedulerError;

use crate::state::AppState;

/// Maximum allowed limit for job listings
const MAX_LIMIT: usize = 1000;

/// Default limit for job listings
const DEFAULT_LIMIT: usize = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status
    pub status: Option<JobStatus>,
    /// Filter by requester
    pub requester: Option<String>,
    /// Maximum number of jobs to return
    pub limit: Option<usize>,
    /// Pagination offset
    pub offset: Option<usize>,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Response for a cancellation request
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub id: String,
    pub cancelled: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct JobErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Scheduler errors mapped onto HTTP.
pub struct ApiError(SchedulerError);

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            SchedulerError::CapacityExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "capacity_exceeded"),
            SchedulerError::Duplicate { .. } => (StatusCode::CONFLICT, "duplicate"),
            SchedulerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            SchedulerError::NotRunning => (StatusCode::SERVICE_UNAVAILABLE, "not_running"),
            SchedulerError::JobNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            SchedulerError::AlreadyFinished { .. } => (StatusCode::CONFLICT, "already_finished"),
        };
        (
            status,
            Json(JobErrorResponse {
                error: self.0.to_string(),
                code,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new job
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<JobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let handle = state.scheduler().submit(body)?;
    let job = state
        .scheduler()
        .job(handle.job_id())
        .ok_or_else(|| SchedulerError::JobNotFound(handle.job_id().to_string()))?;
    info!(job_id = %job.id, "Job submitted via API");
    Ok((StatusCode::CREATED, Json(job)))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .scheduler()
        .job(&id)
        .map(Json)
        .ok_or(ApiError(SchedulerError::JobNotFound(id)))
}

/// List jobs with optional filters
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Json<ListJobsResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let matching: Vec<Job> = state
        .scheduler()
        .list()
        .into_iter()
        .filter(|job| params.status.map_or(true, |s| job.status == s))
        .filter(|job| {
            params
                .requester
                .as_deref()
                .map_or(true, |r| job.requester == r)
        })
        .collect();
    let total = matching.len();
    let jobs = matching.into_iter().skip(offset).take(limit).collect();

    Json(ListJobsResponse {
        jobs,
        total,
        limit,
        offset,
    })
}

/// Cancel a queued or running job
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    state.scheduler().cancel(&id)?;
    info!(job_id = %id, "Job cancelled via API");
    Ok(Json(CancelResponse {
        id,
        cancelled: true,
    }))
}

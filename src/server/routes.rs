use axum::Json;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::AppState;
use super::error::ApiError;
use crate::api::{StartRequest, StopResponse};
use crate::error::WorkerError;
use crate::state_machine::{JobId, JobInfo};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    id: Option<String>,
}

impl IdQuery {
    // An id that does not parse was never issued, so it is simply unknown.
    fn job_id(&self) -> Result<JobId, ApiError> {
        let raw = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("missing job id".into()))?;
        Uuid::parse_str(raw).map_err(|_| ApiError::from(WorkerError::NotFound(raw.to_string())))
    }
}

pub async fn start_job(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<JobInfo>, ApiError> {
    if req.command.trim().is_empty() {
        return Err(ApiError::BadRequest("command must not be empty".into()));
    }
    let job = state.registry.create(req.command, req.args)?;
    Ok(Json(job.info()))
}

pub async fn stop_job(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<StopResponse>, ApiError> {
    let id = query.job_id()?;
    state.registry.stop(&id)?;
    let status = state.registry.get(&id)?.status();
    Ok(Json(StopResponse { id, status }))
}

pub async fn job_status(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<Json<JobInfo>, ApiError> {
    let id = query.job_id()?;
    Ok(Json(state.registry.get(&id)?.info()))
}

pub async fn job_output(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query.job_id()?;
    let output = state.registry.output(&id)?;
    info!(job_id = %id, bytes = output.len(), "serving job output");
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], output))
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobInfo>> {
    let mut jobs: Vec<JobInfo> = state.registry.list().iter().map(|job| job.info()).collect();
    jobs.sort_by_key(|job| job.start_time);
    Json(jobs)
}

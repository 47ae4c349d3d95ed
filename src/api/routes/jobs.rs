//! Job routes
//!
//! - POST   /jobs?kind=audio|video     Submit a recording
//! - GET    /jobs/{id}/status          Current status
//! - GET    /jobs/{id}/result          Procedure of a completed job
//! - DELETE /jobs/{id}                 Cancel a running job
//! - GET    /jobs/{id}/events          SSE stream of progress snapshots
//! - POST   /jobs/{id}/retry?kind=...  Resubmit a failed or cancelled job

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::application::jobs::{JobResult, JobStatus, Submission};
use crate::domain::error::JobError;
use crate::domain::job::{JobFailure, JobId, JobState, ProcedureMetadata, ProgressSnapshot, Stage};

/// Header carrying the caller's own label for a job
pub const CLIENT_ID_HEADER: &str = "x-client-id";

#[derive(Debug, Default, Deserialize)]
pub struct SubmitParams {
    pub kind: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_id: JobId,
    pub state: JobState,
    pub stage: Stage,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<JobId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<JobStatus> for StatusResponse {
    fn from(status: JobStatus) -> Self {
        Self {
            job_id: status.job_id,
            state: status.state,
            stage: status.stage,
            percent: status.percent,
            message: status.message,
            error: status.failure,
            attempt: status.attempt,
            retry_of: status.retry_of,
            client_ref: status.client_ref,
            created_at: status.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StepTiming {
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// Procedure with step texts and their timings as parallel lists
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub job_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub steps: Vec<String>,
    pub timings: Vec<StepTiming>,
    pub metadata: ProcedureMetadata,
}

impl From<JobResult> for ResultResponse {
    fn from(result: JobResult) -> Self {
        let procedure = result.procedure;
        let steps = procedure.steps.texts().map(str::to_string).collect();
        let timings = procedure
            .steps
            .steps()
            .iter()
            .map(|s| StepTiming {
                start: s.start_time,
                end: s.end_time,
            })
            .collect();
        Self {
            job_id: result.job_id,
            summary: procedure.summary,
            steps,
            timings,
            metadata: procedure.metadata,
        }
    }
}

/// Ids that do not parse cannot name a job
fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Job(JobError::NotFound(raw.to_string())))
}

/// Kind from `audio/*` or `video/*`
fn infer_kind(content_type: &str) -> Option<&'static str> {
    match content_type.split('/').next().map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("audio") => Some("audio"),
        Some(t) if t.eq_ignore_ascii_case("video") => Some("video"),
        _ => None,
    }
}

fn build_submission(params: SubmitParams, headers: &HeaderMap, body: Bytes) -> ApiResult<Submission> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let kind = params
        .kind
        .or_else(|| content_type.as_deref().and_then(infer_kind).map(str::to_string))
        .ok_or_else(|| {
            JobError::InvalidInput(
                "media kind is required: pass ?kind=audio|video or an audio/* or video/* Content-Type"
                    .to_string(),
            )
        })?;

    let mut submission = Submission::new(body, kind);
    if let Some(content_type) = content_type {
        submission = submission.with_content_type(content_type);
    }
    if let Some(client) = headers.get(CLIENT_ID_HEADER).and_then(|v| v.to_str().ok()) {
        submission = submission.with_client_ref(client);
    }
    Ok(submission)
}

/// POST /jobs
async fn submit_job(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SubmitParams>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<(StatusCode, Json<SubmittedResponse>)> {
    let submission = build_submission(params, &headers, body?)?;
    let job_id = state.jobs.submit(submission)?;
    Ok((StatusCode::ACCEPTED, Json(SubmittedResponse { job_id })))
}

/// POST /jobs/{id}/retry
async fn retry_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SubmitParams>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<(StatusCode, Json<SubmittedResponse>)> {
    let previous = parse_job_id(&id)?;
    let submission = build_submission(params, &headers, body?)?;
    let job_id = state.jobs.resubmit(previous, submission)?;
    Ok((StatusCode::ACCEPTED, Json(SubmittedResponse { job_id })))
}

/// GET /jobs/{id}/status
async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job_id = parse_job_id(&id)?;
    Ok(Json(state.jobs.status(job_id)?.into()))
}

/// GET /jobs/{id}/result
async fn job_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ResultResponse>> {
    let job_id = parse_job_id(&id)?;
    Ok(Json(state.jobs.result(job_id)?.into()))
}

/// DELETE /jobs/{id}
async fn cancel_job(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let job_id = parse_job_id(&id)?;
    state.jobs.cancel(job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /jobs/{id}/events
async fn job_events(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let job_id = parse_job_id(&id)?;
    let updates = state.jobs.subscribe(job_id)?;

    let events = updates.filter_map(|snapshot| {
        futures::future::ready(progress_event(&snapshot).map(Ok::<_, Infallible>))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// SSE event for a snapshot; snapshots that fail to encode are skipped
fn progress_event(snapshot: &ProgressSnapshot) -> Option<Event> {
    match Event::default()
        .event("progress")
        .id(snapshot.sequence.to_string())
        .json_data(snapshot)
    {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!(
                job_id = %snapshot.job_id,
                sequence = snapshot.sequence,
                error = %e,
                "Failed to encode progress event"
            );
            None
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", post(submit_job))
        .route("/jobs/{id}", delete(cancel_job))
        .route("/jobs/{id}/status", get(job_status))
        .route("/jobs/{id}/result", get(job_result))
        .route("/jobs/{id}/events", get(job_events))
        .route("/jobs/{id}/retry", post(retry_job))
}

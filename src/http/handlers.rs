//! HTTP handlers for the REST API.
//!
//! Each handler delegates to the service layer; the submit handler returns
//! immediately with a job id while the generation runs in the background.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::dto::{
    GenerateRequest, GenerateResponse, HealthResponse, ResultResponse, StatusResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::models::{CourseId, DateSpan};
use crate::services::generation::{self, GenerationRequest};
use crate::services::jobs::JobState;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /generate
///
/// Start a generation in the background. Returns 202 with the job id and
/// the URLs to poll.
pub async fn submit_generation(
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<GenerateResponse>), AppError> {
    let course_ids = match (body.course_id, body.course_ids) {
        (Some(single), None) => Some(vec![CourseId::new(single)]),
        (None, Some(many)) if !many.is_empty() => {
            Some(many.into_iter().map(CourseId::new).collect())
        }
        (None, Some(_)) => {
            return Err(AppError::BadRequest("course_ids must not be empty".into()))
        }
        (None, None) => None,
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "provide either course_id or course_ids, not both".into(),
            ))
        }
    };

    let window = match (body.window_start, body.window_end) {
        (Some(start), Some(end)) if start <= end => Some(DateSpan::new(start, end)),
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "window_start must not be after window_end".into(),
            ))
        }
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "window_start and window_end must be provided together".into(),
            ))
        }
    };

    let request = GenerationRequest {
        course_ids,
        window,
        time_limit_seconds: body.time_limit_seconds,
        label: body.label,
    };

    let (job_id, label) = generation::submit(state.repository.clone(), state.jobs.clone(), request);

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateResponse {
            status_url: format!("/generate/{}/status", job_id),
            redirect_url: format!("/generate/{}/result", job_id),
            job_id,
            label,
        }),
    ))
}

/// GET /generate/{job_id}/status
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<StatusResponse> {
    let view = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;
    let snapshot = state
        .jobs
        .snapshot(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;

    Ok(Json(StatusResponse {
        percent: snapshot.percent,
        state: snapshot.state,
        job_state: view.state,
        message: snapshot.message,
        detail: snapshot.detail,
        eta_seconds: snapshot.eta_seconds,
        current_week_label: snapshot.current_week_label,
        current_week_sessions: snapshot.current_week_sessions,
        finished: snapshot.finished || view.state.is_terminal(),
    }))
}

/// GET /generate/{job_id}/result
pub async fn job_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> HandlerResult<ResultResponse> {
    let view = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;
    let result = state.jobs.result(&job_id);

    Ok(Json(ResultResponse {
        job_state: view.state,
        sessions_placed: result.as_ref().map(|r| r.sessions_placed),
        sessions: result.as_ref().map(|r| r.sessions.clone()).unwrap_or_default(),
        failures: result.as_ref().map(|r| r.failures.clone()).unwrap_or_default(),
        timed_out: result.as_ref().map(|r| r.timed_out).unwrap_or(false),
        error: view.error,
    }))
}

/// POST /generate/{job_id}/cancel
///
/// Request cooperative cancellation; the planner notices at its next
/// suspension point.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let view = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))?;
    if view.state == JobState::Cancelled {
        return Ok(StatusCode::ACCEPTED);
    }
    if !state.jobs.request_cancel(&job_id) {
        return Err(AppError::Conflict(format!(
            "Job {} already finished",
            job_id
        )));
    }
    Ok(StatusCode::ACCEPTED)
}

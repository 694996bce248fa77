//! Data Transfer Objects for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::services::jobs::JobState;
use crate::services::progress::{ProgressState, WeekSessionRow};

/// Request body for starting a generation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerateRequest {
    /// Single course to generate.
    #[serde(default)]
    pub course_id: Option<i64>,
    /// Bulk generation over an explicit course set.
    #[serde(default)]
    pub course_ids: Option<Vec<i64>>,
    /// Optional window override (ISO dates).
    #[serde(default)]
    pub window_start: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub window_end: Option<chrono::NaiveDate>,
    /// Soft wall-clock ceiling in seconds.
    #[serde(default)]
    pub time_limit_seconds: Option<u64>,
    /// Optional display label for the job.
    #[serde(default)]
    pub label: Option<String>,
}

/// 202 response for a submitted generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub job_id: String,
    pub status_url: String,
    pub redirect_url: String,
    pub label: String,
}

/// Poll-able job snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub percent: u8,
    pub state: ProgressState,
    pub job_state: JobState,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub eta_seconds: Option<f64>,
    pub current_week_label: Option<String>,
    pub current_week_sessions: Vec<WeekSessionRow>,
    pub finished: bool,
}

/// Final result payload: placements or the error that stopped the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultResponse {
    pub job_state: JobState,
    pub sessions_placed: Option<u32>,
    pub sessions: Vec<crate::models::NewSession>,
    pub failures: Vec<String>,
    pub timed_out: bool,
    pub error: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

//! Progress tracking for generation jobs.
//!
//! The planner reports through the [`ProgressSink`] trait; the concrete
//! [`ProgressTracker`] is a thread-safe accumulator owned by the job and
//! passed explicitly down the call stack. Readers only ever see immutable
//! [`ProgressSnapshot`] values copied out under the lock.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::models::calendar;

/// One row of the current-week placement table shown while a job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekSessionRow {
    pub course: String,
    pub class_label: String,
    pub subgroup: Option<String>,
    pub teacher: String,
    pub time: String,
    #[serde(rename = "type")]
    pub session_type: String,
}

/// Reporting interface the planner writes to.
pub trait ProgressSink: Send + Sync {
    /// Declare the expected total session count.
    fn initialise(&self, total_sessions: u32);
    /// Record one placed session of `hours` hours.
    fn record_session(&self, hours: u32);
    /// Declare a new weekly planning target.
    fn prepare_week(&self, week_start: NaiveDate, planned: u32);
    /// Record a placement in the current week's table.
    fn week_session_placed(&self, week_start: NaiveDate, row: WeekSessionRow);
}

/// Fallback sink used when no tracking is requested.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn initialise(&self, _total_sessions: u32) {}
    fn record_session(&self, _hours: u32) {}
    fn prepare_week(&self, _week_start: NaiveDate, _planned: u32) {}
    fn week_session_placed(&self, _week_start: NaiveDate, _row: WeekSessionRow) {}
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    Idle,
    Running,
    Success,
    Error,
}

/// Immutable progress view. Copy-on-read: every call returns a fresh value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub label: String,
    pub state: ProgressState,
    pub percent: u8,
    pub eta_seconds: Option<f64>,
    pub sessions_placed: u32,
    pub sessions_total: u32,
    pub hours_placed: u32,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub finished: bool,
    pub current_week_label: Option<String>,
    /// Requests offered to the current week.
    pub current_week_planned: u32,
    pub current_week_sessions: Vec<WeekSessionRow>,
}

#[derive(Debug)]
struct ProgressInner {
    label: String,
    state: ProgressState,
    sessions_total: u32,
    sessions_placed: u32,
    hours_placed: u32,
    message: Option<String>,
    detail: Option<String>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    current_week: Option<NaiveDate>,
    current_week_planned: u32,
    current_week_rows: Vec<WeekSessionRow>,
}

/// Thread-safe progress tracker, cheap to clone and share with the worker.
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Mutex<ProgressInner>>,
}

impl ProgressTracker {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProgressInner {
                label: label.into(),
                state: ProgressState::Idle,
                sessions_total: 0,
                sessions_placed: 0,
                hours_placed: 0,
                message: None,
                detail: None,
                started_at: None,
                finished_at: None,
                current_week: None,
                current_week_planned: 0,
                current_week_rows: Vec::new(),
            })),
        }
    }

    pub fn complete(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.state = ProgressState::Success;
        inner.message = Some(message.into());
        if inner.started_at.is_none() {
            inner.started_at = Some(Instant::now());
        }
        inner.finished_at = Some(Instant::now());
    }

    pub fn fail(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.state = ProgressState::Error;
        inner.message = Some(message.into());
        if inner.started_at.is_none() {
            inner.started_at = Some(Instant::now());
        }
        inner.finished_at = Some(Instant::now());
    }

    pub fn set_detail(&self, detail: impl Into<String>) {
        self.inner.lock().detail = Some(detail.into());
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.inner.lock().state,
            ProgressState::Success | ProgressState::Error
        )
    }

    /// Seconds since the tracker finished (or started, while running).
    pub fn age_seconds(&self) -> f64 {
        let inner = self.inner.lock();
        let reference = inner.finished_at.or(inner.started_at);
        reference
            .map(|instant| instant.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = self.inner.lock();
        let percent = percent(&inner);
        ProgressSnapshot {
            label: inner.label.clone(),
            state: inner.state,
            percent,
            eta_seconds: eta_seconds(&inner),
            sessions_placed: inner.sessions_placed,
            sessions_total: inner.sessions_total,
            hours_placed: inner.hours_placed,
            message: inner.message.clone(),
            detail: inner.detail.clone(),
            finished: matches!(inner.state, ProgressState::Success | ProgressState::Error),
            current_week_label: inner.current_week.map(calendar::week_label),
            current_week_planned: inner.current_week_planned,
            current_week_sessions: inner.current_week_rows.clone(),
        }
    }
}

impl ProgressSink for ProgressTracker {
    fn initialise(&self, total_sessions: u32) {
        let mut inner = self.inner.lock();
        inner.sessions_total = total_sessions;
        inner.state = ProgressState::Running;
        if inner.started_at.is_none() {
            inner.started_at = Some(Instant::now());
        }
    }

    fn record_session(&self, hours: u32) {
        let mut inner = self.inner.lock();
        inner.sessions_placed += 1;
        inner.hours_placed += hours;
        if inner.state == ProgressState::Idle {
            inner.state = ProgressState::Running;
        }
    }

    fn prepare_week(&self, week_start: NaiveDate, planned: u32) {
        let mut inner = self.inner.lock();
        inner.current_week = Some(week_start);
        inner.current_week_planned = planned;
        inner.current_week_rows.clear();
    }

    fn week_session_placed(&self, week_start: NaiveDate, row: WeekSessionRow) {
        let mut inner = self.inner.lock();
        if inner.current_week != Some(week_start) {
            inner.current_week = Some(week_start);
            inner.current_week_rows.clear();
        }
        inner.current_week_rows.push(row);
    }
}

fn percent(inner: &ProgressInner) -> u8 {
    if inner.state == ProgressState::Success {
        return 100;
    }
    if inner.sessions_total == 0 {
        return 0;
    }
    let ratio = inner.sessions_placed as f64 / inner.sessions_total as f64;
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Linear extrapolation from elapsed time and the placed/total ratio.
fn eta_seconds(inner: &ProgressInner) -> Option<f64> {
    if inner.state != ProgressState::Running
        || inner.sessions_total == 0
        || inner.sessions_placed == 0
    {
        return None;
    }
    if inner.sessions_placed >= inner.sessions_total {
        return Some(0.0);
    }
    let elapsed = inner.started_at?.elapsed().as_secs_f64();
    let ratio = inner.sessions_placed as f64 / inner.sessions_total as f64;
    Some((elapsed * (1.0 / ratio - 1.0)).max(0.0))
}

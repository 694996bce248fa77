//! Background job runner for generation requests.
//!
//! Jobs are tracked in an in-memory store keyed by uuid, with the state
//! machine `Queued → Running → (Success | Failed | Cancelled)`. Two jobs
//! whose course scopes overlap never run concurrently: a job acquires its
//! scope before entering `Running` and waiters are woken when a scope is
//! released. Cancellation is cooperative: a flag the planner polls between
//! weeks and between requests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::models::NewSession;
use crate::services::progress::{ProgressSnapshot, ProgressTracker};

/// Job status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failed | JobState::Cancelled)
    }
}

/// Data scope a job plans over; overlapping scopes are serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobScope {
    All,
    Courses(std::collections::BTreeSet<i64>),
}

impl JobScope {
    pub fn overlaps(&self, other: &JobScope) -> bool {
        match (self, other) {
            (JobScope::All, _) | (_, JobScope::All) => true,
            (JobScope::Courses(a), JobScope::Courses(b)) => !a.is_disjoint(b),
        }
    }
}

/// Final payload of a successful job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub sessions_placed: u32,
    pub sessions: Vec<NewSession>,
    pub failures: Vec<String>,
    pub timed_out: bool,
}

struct JobEntry {
    label: String,
    state: JobState,
    tracker: ProgressTracker,
    cancel: Arc<AtomicBool>,
    created_at: chrono::DateTime<chrono::Utc>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
    result: Option<JobResult>,
    error: Option<String>,
}

/// Read-only view of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub label: String,
    pub state: JobState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub error: Option<String>,
}

#[derive(Default)]
struct ScopeLocks {
    active: Mutex<Vec<(String, JobScope)>>,
    released: Notify,
}

/// Guard representing scope ownership; dropping it releases the scope and
/// wakes queued jobs.
pub struct ScopeGuard {
    locks: Arc<ScopeLocks>,
    job_id: String,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.locks
            .active
            .lock()
            .retain(|(job_id, _)| *job_id != self.job_id);
        self.locks.released.notify_waiters();
    }
}

/// In-memory job runner.
#[derive(Clone)]
pub struct JobRunner {
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
    scopes: Arc<ScopeLocks>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            scopes: Arc::new(ScopeLocks::default()),
        }
    }

    /// Create a queued job and hand back its tracker and cancel flag.
    pub fn create(&self, label: impl Into<String>) -> (String, ProgressTracker, Arc<AtomicBool>) {
        let job_id = Uuid::new_v4().to_string();
        let label = label.into();
        let tracker = ProgressTracker::new(label.clone());
        let cancel = Arc::new(AtomicBool::new(false));
        self.jobs.write().insert(
            job_id.clone(),
            JobEntry {
                label,
                state: JobState::Queued,
                tracker: tracker.clone(),
                cancel: cancel.clone(),
                created_at: chrono::Utc::now(),
                finished_at: None,
                result: None,
                error: None,
            },
        );
        (job_id, tracker, cancel)
    }

    /// Wait until no running job's scope overlaps `scope`, then claim it.
    pub async fn acquire_scope(&self, job_id: &str, scope: JobScope) -> ScopeGuard {
        loop {
            let notified = self.scopes.released.notified();
            {
                let mut active = self.scopes.active.lock();
                if !active.iter().any(|(_, held)| held.overlaps(&scope)) {
                    active.push((job_id.to_string(), scope));
                    return ScopeGuard {
                        locks: self.scopes.clone(),
                        job_id: job_id.to_string(),
                    };
                }
            }
            notified.await;
        }
    }

    pub fn mark_running(&self, job_id: &str) {
        if let Some(entry) = self.jobs.write().get_mut(job_id) {
            if entry.state == JobState::Queued {
                entry.state = JobState::Running;
            }
        }
    }

    pub fn complete(&self, job_id: &str, result: JobResult) {
        if let Some(entry) = self.jobs.write().get_mut(job_id) {
            entry.state = JobState::Success;
            entry.finished_at = Some(chrono::Utc::now());
            entry.result = Some(result);
        }
    }

    pub fn fail(&self, job_id: &str, error: impl Into<String>) {
        if let Some(entry) = self.jobs.write().get_mut(job_id) {
            entry.state = JobState::Failed;
            entry.finished_at = Some(chrono::Utc::now());
            entry.error = Some(error.into());
        }
    }

    pub fn mark_cancelled(&self, job_id: &str) {
        if let Some(entry) = self.jobs.write().get_mut(job_id) {
            entry.state = JobState::Cancelled;
            entry.finished_at = Some(chrono::Utc::now());
        }
    }

    /// Request cooperative cancellation; returns false for unknown or
    /// already-finished jobs.
    pub fn request_cancel(&self, job_id: &str) -> bool {
        let jobs = self.jobs.read();
        match jobs.get(job_id) {
            Some(entry) if !entry.state.is_terminal() => {
                entry.cancel.store(true, Ordering::Relaxed);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, job_id: &str) -> Option<JobView> {
        self.jobs.read().get(job_id).map(|entry| JobView {
            job_id: job_id.to_string(),
            label: entry.label.clone(),
            state: entry.state,
            created_at: entry.created_at,
            finished_at: entry.finished_at,
            error: entry.error.clone(),
        })
    }

    pub fn snapshot(&self, job_id: &str) -> Option<ProgressSnapshot> {
        self.jobs
            .read()
            .get(job_id)
            .map(|entry| entry.tracker.snapshot())
    }

    pub fn result(&self, job_id: &str) -> Option<JobResult> {
        self.jobs
            .read()
            .get(job_id)
            .and_then(|entry| entry.result.clone())
    }

    /// Drop finished jobs older than `max_age_seconds`.
    pub fn purge_finished(&self, max_age_seconds: f64) {
        self.jobs.write().retain(|_, entry| {
            !(entry.state.is_terminal() && entry.tracker.age_seconds() > max_age_seconds)
        });
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

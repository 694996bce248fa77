//! The timetable generation engine.
//!
//! Submodules, in dependency order:
//!
//! - [`availability`]: per-run availability index with transactional
//!   checkpoints
//! - [`constraints`]: stateless candidate evaluation with typed rejections
//! - [`requests`]: course → session-request translation
//! - [`placement`]: candidate search for a single request
//! - [`relocation`]: bounded single-swap repair for TD/TP requests
//! - [`planner`]: the week-by-week orchestration loop
//!
//! The engine is synchronous and single-threaded by design: every placement
//! mutates the availability index the next placement reads, so a generation
//! runs as one cooperative task (the job runner wraps it in
//! `spawn_blocking`). Cancellation and the soft time ceiling are polled at
//! suspension points between weeks and between requests.

pub mod availability;
pub mod constraints;
pub mod placement;
pub mod planner;
pub mod relocation;
pub mod requests;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::calendar::{self, MAX_SESSION_HOURS};
use crate::models::{
    AllowedWeek, ClassGroup, ClassGroupId, ClosingPeriod, Course, CourseId, CourseType, DateSpan,
    Room, Session, Teacher, TeacherId,
};

pub use constraints::Rejection;
pub use planner::WeeklyPlanner;
pub use requests::{RequestKind, SessionRequest};

/// Errors that abort a generation before any placement.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Broken referential integrity or an unplannable course definition.
    #[error("Inconsistent planning data: {0}")]
    DataInconsistency(String),

    /// The planning window contains no working day once closing periods are
    /// removed.
    #[error("The planning window contains no working day")]
    WindowEmpty,
}

/// Lightweight per-course metadata kept for every persisted session the
/// index is seeded with, including courses outside the generation scope.
#[derive(Debug, Clone)]
pub struct CourseMeta {
    pub name: String,
    pub course_type: CourseType,
    pub family_key: Option<String>,
}

/// Immutable snapshot tables a generation runs against.
///
/// Loaded once at job start through the repository interfaces; the planner
/// never touches persistence afterwards.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    /// Courses to generate, sorted by id.
    pub courses: Vec<Course>,
    pub teachers: HashMap<TeacherId, Teacher>,
    pub class_groups: HashMap<ClassGroupId, ClassGroup>,
    /// All rooms, sorted by id.
    pub rooms: Vec<Room>,
    pub closings: Vec<ClosingPeriod>,
    /// Every persisted session that may occupy a resource during the window,
    /// including sessions of courses outside the generation scope.
    pub existing_sessions: Vec<Session>,
    /// Metadata for every course referenced by `existing_sessions`.
    pub course_meta: HashMap<CourseId, CourseMeta>,
    pub allowed_weeks: HashMap<CourseId, Vec<AllowedWeek>>,
    /// Overall planning window.
    pub window: DateSpan,
}

impl GenerationInput {
    pub fn course(&self, id: CourseId) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub fn allowed_weeks_for(&self, course: CourseId) -> &[AllowedWeek] {
        self.allowed_weeks
            .get(&course)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Pre-planning integrity checks. Anything caught here aborts the job
    /// before the first placement.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        for course in &self.courses {
            if course.class_links.is_empty() {
                return Err(SchedulerError::DataInconsistency(format!(
                    "course '{}' is linked to no class-group",
                    course.name
                )));
            }
            for link in &course.class_links {
                if !self.class_groups.contains_key(&link.class_group) {
                    return Err(SchedulerError::DataInconsistency(format!(
                        "course '{}' references unknown class-group {}",
                        course.name, link.class_group
                    )));
                }
                for teacher in [link.teacher_a, link.teacher_b].into_iter().flatten() {
                    if !self.teachers.contains_key(&teacher) {
                        return Err(SchedulerError::DataInconsistency(format!(
                            "course '{}' references unknown teacher {}",
                            course.name, teacher
                        )));
                    }
                }
            }
            for teacher in &course.teachers {
                if !self.teachers.contains_key(teacher) {
                    return Err(SchedulerError::DataInconsistency(format!(
                        "course '{}' references unknown teacher {}",
                        course.name, teacher
                    )));
                }
            }
            if requests::eligible_teachers(course).is_empty() {
                return Err(SchedulerError::DataInconsistency(format!(
                    "course '{}' has no eligible teacher",
                    course.name
                )));
            }
            if course.course_type == CourseType::SAE && requests::sae_pair(course).is_none() {
                return Err(SchedulerError::DataInconsistency(format!(
                    "course '{}' needs two teachers for its project sessions",
                    course.name
                )));
            }
            if course.session_length_hours == 0 {
                return Err(SchedulerError::DataInconsistency(format!(
                    "course '{}' has a zero session length",
                    course.name
                )));
            }
            if course.session_length_hours > MAX_SESSION_HOURS && !course.split_long_sessions {
                return Err(SchedulerError::DataInconsistency(format!(
                    "course '{}' sessions last {}h but no working window exceeds {}h \
                     and splitting is disabled",
                    course.name, course.session_length_hours, MAX_SESSION_HOURS
                )));
            }
            if course.window.is_none() && self.allowed_weeks_for(course.id).is_empty() {
                return Err(SchedulerError::DataInconsistency(format!(
                    "course '{}' has neither a planning window nor allowed weeks",
                    course.name
                )));
            }
        }

        if calendar::weeks_in(self.window, &self.closings).is_empty() {
            return Err(SchedulerError::WindowEmpty);
        }
        Ok(())
    }
}

/// Cooperative run controls shared between the job runner and the planner.
#[derive(Debug, Clone)]
pub struct RunControl {
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new(cancel: Arc<AtomicBool>, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    pub fn unbounded() -> Self {
        Self {
            cancel: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// One unplaceable request, reported at the end of planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementFailure {
    pub course: CourseId,
    pub course_name: String,
    pub class_group: ClassGroupId,
    pub subgroup_label: Option<String>,
    pub reason: Rejection,
}

impl PlacementFailure {
    pub fn describe(&self) -> String {
        match &self.subgroup_label {
            Some(label) => format!(
                "{} (groupe {}) : {}",
                self.course_name,
                label,
                self.reason.describe()
            ),
            None => format!("{} : {}", self.course_name, self.reason.describe()),
        }
    }
}

/// Per-course summary used to build schedule-log entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseReport {
    pub course: CourseId,
    pub course_name: String,
    pub requested: u32,
    pub placed: u32,
    /// Diagnostic lines (failed requests, silent teacher fallbacks).
    pub messages: Vec<String>,
}

/// Result of one planner run. Partial results are valid on timeout; on
/// cancellation the caller discards `placed` instead of committing it.
#[derive(Debug, Clone, Default)]
pub struct GenerationOutcome {
    /// Placed sessions, in placement order.
    pub placed: Vec<crate::models::NewSession>,
    pub failures: Vec<PlacementFailure>,
    pub reports: Vec<CourseReport>,
    pub cancelled: bool,
    pub timed_out: bool,
}

impl GenerationOutcome {
    pub fn fully_placed(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

//! Generation orchestration.
//!
//! A submitted request becomes a background job: snapshot load through the
//! repositories, planning under `spawn_blocking`, then a single-transaction
//! persist of the placed sessions plus one schedule-log entry per course.
//! The repository is only touched at the two ends; the planning loop runs
//! purely against the in-memory availability index.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, NaiveDate};
use tracing::{error, info, warn};

use crate::db::repository::{FullRepository, GenerationScope};
use crate::models::{
    CourseId, DateSpan, NewScheduleLog, ScheduleLogStatus,
};
use crate::scheduler::{
    CourseMeta, GenerationInput, GenerationOutcome, RunControl, WeeklyPlanner,
};
use crate::services::jobs::{JobResult, JobRunner, JobScope};
use crate::services::progress::ProgressTracker;

/// Parameters of one generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Courses to generate; `None` plans every course.
    pub course_ids: Option<Vec<CourseId>>,
    /// Overrides the window derived from the courses, when set.
    pub window: Option<DateSpan>,
    /// Soft wall-clock ceiling; the planner stops after the current week.
    pub time_limit_seconds: Option<u64>,
    pub label: Option<String>,
}

impl GenerationRequest {
    fn scope(&self) -> GenerationScope {
        match &self.course_ids {
            Some(ids) => GenerationScope::Courses(ids.clone()),
            None => GenerationScope::All,
        }
    }

    fn job_scope(&self) -> JobScope {
        match &self.course_ids {
            Some(ids) => JobScope::Courses(ids.iter().map(|id| id.value()).collect::<BTreeSet<_>>()),
            None => JobScope::All,
        }
    }

    fn display_label(&self) -> String {
        match (&self.label, &self.course_ids) {
            (Some(label), _) => label.clone(),
            (None, Some(ids)) if ids.len() == 1 => format!("Génération — cours {}", ids[0]),
            (None, Some(ids)) => format!("Génération — {} cours", ids.len()),
            (None, None) => "Génération — tous les cours".to_string(),
        }
    }
}

/// Submit a generation job; returns immediately with its id and label.
pub fn submit(
    repository: Arc<dyn FullRepository>,
    runner: JobRunner,
    request: GenerationRequest,
) -> (String, String) {
    let label = request.display_label();
    let (job_id, tracker, cancel) = runner.create(label.clone());

    let spawned_id = job_id.clone();
    tokio::spawn(async move {
        run_job(repository, runner, request, spawned_id, tracker, cancel).await;
    });

    (job_id, label)
}

async fn run_job(
    repository: Arc<dyn FullRepository>,
    runner: JobRunner,
    request: GenerationRequest,
    job_id: String,
    tracker: ProgressTracker,
    cancel: Arc<AtomicBool>,
) {
    // Serialize against any running job with an overlapping course set.
    let _scope_guard = runner.acquire_scope(&job_id, request.job_scope()).await;
    runner.mark_running(&job_id);
    info!(%job_id, "generation job started");

    let input = match load_input(repository.as_ref(), &request).await {
        Ok(input) => input,
        Err(message) => {
            error!(%job_id, %message, "failed to load planning snapshot");
            tracker.fail(&message);
            runner.fail(&job_id, message);
            return;
        }
    };

    let deadline = request
        .time_limit_seconds
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    let planner_control = RunControl::new(cancel, deadline);

    let planner_tracker = tracker.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let result = WeeklyPlanner::new(&input, &planner_tracker, &planner_control).run();
        (input, result)
    })
    .await;

    let (input, outcome) = match joined {
        Ok((input, Ok(outcome))) => (input, outcome),
        Ok((_, Err(scheduler_error))) => {
            let message = scheduler_error.to_string();
            tracker.fail(&message);
            runner.fail(&job_id, message);
            return;
        }
        Err(join_error) => {
            let message = format!("planning task panicked: {}", join_error);
            error!(%job_id, %message, "planner crashed");
            tracker.fail(&message);
            runner.fail(&job_id, message);
            return;
        }
    };

    if outcome.cancelled {
        // Uncommitted placements are dropped; nothing reaches the store.
        info!(%job_id, "generation cancelled by user");
        tracker.fail("génération annulée");
        runner.mark_cancelled(&job_id);
        return;
    }

    if let Err(e) = repository.persist_sessions(&outcome.placed).await {
        let message = format!("échec de l'enregistrement des séances : {}", e);
        error!(%job_id, %message, "persist failed");
        tracker.fail(&message);
        runner.fail(&job_id, message);
        return;
    }

    write_schedule_logs(repository.as_ref(), &input, &outcome).await;

    let placed = outcome.placed.len() as u32;
    let message = completion_message(&outcome);
    if !outcome.failures.is_empty() {
        let detail = outcome
            .failures
            .iter()
            .map(|f| f.describe())
            .collect::<Vec<_>>()
            .join(" ; ");
        tracker.set_detail(detail);
    }
    tracker.complete(&message);
    runner.complete(
        &job_id,
        JobResult {
            sessions_placed: placed,
            sessions: outcome.placed.clone(),
            failures: outcome.failures.iter().map(|f| f.describe()).collect(),
            timed_out: outcome.timed_out,
        },
    );
    info!(%job_id, placed, failures = outcome.failures.len(), "generation job finished");
}

fn completion_message(outcome: &GenerationOutcome) -> String {
    let placed = outcome.placed.len();
    let mut message = format!("{} séances placées", placed);
    if outcome.timed_out {
        message.push_str(" (arrêt sur limite de temps)");
    }
    if !outcome.failures.is_empty() {
        let names: BTreeSet<String> = outcome
            .failures
            .iter()
            .map(|f| f.course_name.clone())
            .collect();
        message.push_str(&format!(
            " — {} demandes non placées ({})",
            outcome.failures.len(),
            names.into_iter().collect::<Vec<_>>().join(", ")
        ));
    }
    message
}

async fn write_schedule_logs(
    repository: &dyn FullRepository,
    input: &GenerationInput,
    outcome: &GenerationOutcome,
) {
    for report in &outcome.reports {
        let status = if report.requested == 0 || report.placed >= report.requested {
            ScheduleLogStatus::Success
        } else if report.placed > 0 {
            ScheduleLogStatus::Warning
        } else {
            ScheduleLogStatus::Error
        };
        let log = NewScheduleLog {
            course: report.course,
            status,
            summary: format!("{}/{} séances placées", report.placed, report.requested),
            messages: report.messages.clone(),
            window_start: input.window.start,
            window_end: input.window.end,
        };
        if let Err(e) = repository.persist_schedule_log(&log).await {
            warn!(course = %report.course_name, error = %e, "failed to append schedule log");
        }
    }
}

/// Load the planning snapshot through the repository contracts.
///
/// Sessions of every course (scoped or not) seed the availability index,
/// so occupancy from courses outside the generation scope is respected.
pub async fn load_input(
    repository: &dyn FullRepository,
    request: &GenerationRequest,
) -> Result<GenerationInput, String> {
    let scope = request.scope();
    let courses = repository
        .list_courses(&scope)
        .await
        .map_err(|e| e.to_string())?;
    let all_courses = match scope {
        GenerationScope::All => courses.clone(),
        _ => repository
            .list_courses(&GenerationScope::All)
            .await
            .map_err(|e| e.to_string())?,
    };
    let teachers = repository.list_teachers().await.map_err(|e| e.to_string())?;
    let class_groups = repository
        .list_class_groups()
        .await
        .map_err(|e| e.to_string())?;
    let rooms = repository.list_rooms().await.map_err(|e| e.to_string())?;
    let closings = repository
        .list_closing_periods()
        .await
        .map_err(|e| e.to_string())?;

    let mut existing_sessions = Vec::new();
    let mut course_meta = HashMap::new();
    for course in &all_courses {
        course_meta.insert(
            course.id,
            CourseMeta {
                name: course.name.clone(),
                course_type: course.course_type,
                family_key: course.family_key(),
            },
        );
        existing_sessions.extend(
            repository
                .existing_sessions(course.id)
                .await
                .map_err(|e| e.to_string())?,
        );
    }
    existing_sessions.sort_by_key(|s| s.id);

    let mut allowed_weeks = HashMap::new();
    for course in &courses {
        let weeks = repository
            .allowed_weeks(course.id)
            .await
            .map_err(|e| e.to_string())?;
        if !weeks.is_empty() {
            allowed_weeks.insert(course.id, weeks);
        }
    }

    let window = match request.window {
        Some(window) => window,
        None => derive_window(&courses, &allowed_weeks)
            .ok_or_else(|| "aucune période de planification déterminable".to_string())?,
    };

    Ok(GenerationInput {
        courses,
        teachers: teachers.into_iter().map(|t| (t.id, t)).collect(),
        class_groups: class_groups.into_iter().map(|g| (g.id, g)).collect(),
        rooms,
        closings,
        existing_sessions,
        course_meta,
        allowed_weeks,
        window,
    })
}

/// Union of course windows and allowed-week spans.
fn derive_window(
    courses: &[crate::models::Course],
    allowed_weeks: &HashMap<CourseId, Vec<crate::models::AllowedWeek>>,
) -> Option<DateSpan> {
    let mut start: Option<NaiveDate> = None;
    let mut end: Option<NaiveDate> = None;
    let mut widen = |s: NaiveDate, e: NaiveDate| {
        start = Some(start.map_or(s, |cur| cur.min(s)));
        end = Some(end.map_or(e, |cur| cur.max(e)));
    };
    for course in courses {
        if let Some(window) = course.window {
            widen(window.start, window.end);
        }
        for week in allowed_weeks.get(&course.id).map(Vec::as_slice).unwrap_or(&[]) {
            widen(week.week_start, week.week_start + ChronoDuration::days(6));
        }
    }
    Some(DateSpan::new(start?, end?))
}

//! Weekly planner: the week-by-week orchestration loop.
//!
//! For every week of the window, the planner selects active courses, releases
//! the requests each series is due (one fresh request per week plus any
//! carried failures), sorts them by (type priority, course priority, course
//! name), and drives the placement engine. TD/TP failures go through the
//! relocation engine before being carried to the next week. The loop is
//! deterministic: identical inputs produce an identical placement sequence.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use crate::models::{calendar, CourseId, NewSession, SessionId, TeacherId};
use crate::services::progress::{ProgressSink, WeekSessionRow};

use super::availability::{AvailabilityIndex, IndexedSession};
use super::constraints::Rejection;
use super::placement::{place_request, Placed, PlacementContext};
use super::relocation::try_relocate;
use super::requests::{self, CourseQueues, SeriesKey};
use super::{
    CourseReport, GenerationInput, GenerationOutcome, PlacementFailure, RunControl, SchedulerError,
};

pub struct WeeklyPlanner<'a> {
    input: &'a GenerationInput,
    progress: &'a dyn ProgressSink,
    control: &'a RunControl,
    index: AvailabilityIndex,
    queues: Vec<CourseQueues>,
    continuity: HashMap<SeriesKey, (chrono::NaiveDateTime, TeacherId)>,
    /// Placed sessions in placement order; relocation rewrites entries in
    /// place so the output order stays stable.
    placed: Vec<(SessionId, IndexedSession)>,
    notices: Vec<(CourseId, String)>,
}

impl<'a> WeeklyPlanner<'a> {
    pub fn new(
        input: &'a GenerationInput,
        progress: &'a dyn ProgressSink,
        control: &'a RunControl,
    ) -> Self {
        Self {
            input,
            progress,
            control,
            index: AvailabilityIndex::build(input),
            queues: requests::build_requests(input),
            continuity: requests::continuity_seed(input),
            placed: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Run the full planning loop. Only data inconsistencies and an empty
    /// window abort; every other condition yields a (possibly partial)
    /// outcome.
    pub fn run(mut self) -> Result<GenerationOutcome, SchedulerError> {
        self.input.validate()?;

        let total: usize = self.queues.iter().map(CourseQueues::pending).sum();
        let requested_per_course: HashMap<CourseId, u32> = self
            .queues
            .iter()
            .map(|q| (q.course, q.pending() as u32))
            .collect();
        self.progress.initialise(total as u32);

        let weeks = calendar::weeks_in(self.input.window, &self.input.closings);
        let mut cancelled = false;
        let mut timed_out = false;

        'weeks: for week in weeks {
            if self.control.cancel_requested() {
                cancelled = true;
                break;
            }
            if self.control.deadline_passed() {
                info!(week = %week, "soft time ceiling reached, stopping before next week");
                timed_out = true;
                break;
            }

            let released = self.release_for_week(week);
            if released.is_empty() {
                continue;
            }
            info!(week = %calendar::week_label(week), requests = released.len(), "planning week");
            self.progress.prepare_week(week, released.len() as u32);

            let mut placed_this_week = self.seed_week_counts(week);

            for slot in released {
                if self.control.cancel_requested() {
                    cancelled = true;
                    break 'weeks;
                }
                self.process_request(week, slot, &mut placed_this_week);
            }
        }

        Ok(self.into_outcome(requested_per_course, cancelled, timed_out))
    }

    /// Requests released to a week, sorted by the composite priority key.
    fn release_for_week(&mut self, week: NaiveDate) -> Vec<ReleaseSlot> {
        let mut released = Vec::new();
        for (course_idx, queues) in self.queues.iter_mut().enumerate() {
            if queues.pending() == 0 {
                continue;
            }
            let course = &self.input.courses[course_idx];
            let allowed = self.input.allowed_weeks_for(course.id);
            if !allowed.is_empty() && !allowed.iter().any(|w| w.week_start == week) {
                continue;
            }
            if let Some(window) = course.window {
                // Skip weeks that end before the course window opens or
                // start after it closes.
                if week + Duration::days(6) < window.start || week > window.end {
                    continue;
                }
            }
            // One fresh request per series per week spreads a series over
            // distinct weeks; an explicit weekly quota raises the pace.
            let series_count = queues.series.len().max(1);
            let fresh_per_series = allowed
                .iter()
                .find(|w| w.week_start == week)
                .and_then(|w| w.quota)
                .map(|quota| ((quota as usize).div_ceil(series_count)).max(1))
                .unwrap_or(1);
            for (series_idx, series) in queues.series.iter_mut().enumerate() {
                let carried = series.queue.iter().take_while(|r| r.released).count();
                let release_n = (carried + fresh_per_series).min(series.queue.len());
                for request in series.queue.iter_mut().take(release_n) {
                    request.released = true;
                    released.push(ReleaseSlot {
                        course_idx,
                        series_idx,
                        sort_key: (
                            course.course_type.priority_rank(),
                            course.priority,
                            course.name.clone(),
                            request.seq,
                        ),
                    });
                }
            }
        }
        released.sort_by(|a, b| a.sort_key.cmp(&b.sort_key));
        released
    }

    /// Weekly quota accounting starts from the persisted sessions already in
    /// that week, so quotas hold across generation runs.
    fn seed_week_counts(&self, week: NaiveDate) -> HashMap<CourseId, u32> {
        let week_end = week + Duration::days(7);
        let mut counts: HashMap<CourseId, u32> = HashMap::new();
        for session in &self.input.existing_sessions {
            if session.start.date() >= week && session.start.date() < week_end {
                *counts.entry(session.course).or_default() += 1;
            }
        }
        counts
    }

    fn process_request(
        &mut self,
        week: NaiveDate,
        slot: ReleaseSlot,
        placed_this_week: &mut HashMap<CourseId, u32>,
    ) {
        let course = &self.input.courses[slot.course_idx];
        let course_id = course.id;
        let quota = self
            .input
            .allowed_weeks_for(course_id)
            .iter()
            .find(|w| w.week_start == week)
            .and_then(|w| w.quota);
        let used = placed_this_week.get(&course_id).copied().unwrap_or(0);
        let quota_remaining = quota.map(|q| q.saturating_sub(used));

        let series = &mut self.queues[slot.course_idx].series[slot.series_idx];
        let Some(request) = series.queue.front_mut() else {
            return;
        };

        if quota_remaining == Some(0) {
            request.last_rejection = Some(Rejection::WeekQuotaReached);
            request.carried_weeks += 1;
            return;
        }

        let key = series.key.clone();
        let continuity_teacher = self.continuity.get(&key).map(|(_, teacher)| *teacher);
        let ctx = PlacementContext {
            input: self.input,
            quota_remaining,
            continuity_teacher,
        };

        let request_snapshot = request.clone();
        match place_request(&mut self.index, &ctx, &request_snapshot, week) {
            Ok(placed) => {
                series.queue.pop_front();
                self.commit_placement(&key, continuity_teacher, placed, placed_this_week, week);
            }
            Err(best) => {
                if course.course_type.relocatable() {
                    if let Some(relocation) =
                        try_relocate(&mut self.index, self.input, &ctx, &request_snapshot, week)
                    {
                        let series = &mut self.queues[slot.course_idx].series[slot.series_idx];
                        series.queue.pop_front();
                        self.apply_relocation(relocation.moved_from, relocation.moved_to);
                        self.commit_placement(
                            &key,
                            continuity_teacher,
                            relocation.placed,
                            placed_this_week,
                            week,
                        );
                        return;
                    }
                }
                let series = &mut self.queues[slot.course_idx].series[slot.series_idx];
                if let Some(request) = series.queue.front_mut() {
                    request.attempts += 1;
                    request.carried_weeks += 1;
                    request.last_rejection = Some(best);
                }
                debug!(course = %course.name, week = %week, reason = ?best, "request carried over");
            }
        }
    }

    fn commit_placement(
        &mut self,
        key: &SeriesKey,
        continuity_teacher: Option<TeacherId>,
        placed: Placed,
        placed_this_week: &mut HashMap<CourseId, u32>,
        week: NaiveDate,
    ) {
        let session = &placed.session;
        *placed_this_week.entry(session.course).or_default() += 1;

        if let Some(previous) = continuity_teacher {
            if previous != session.teacher {
                let previous_name = self
                    .input
                    .teachers
                    .get(&previous)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| previous.to_string());
                let new_name = self
                    .input
                    .teachers
                    .get(&session.teacher)
                    .map(|t| t.name.clone())
                    .unwrap_or_else(|| session.teacher.to_string());
                self.notices.push((
                    session.course,
                    format!(
                        "continuité enseignant rompue le {} : {} remplace {}",
                        session.start.format("%d/%m/%Y"),
                        new_name,
                        previous_name
                    ),
                ));
            }
        }

        let entry = self.continuity.entry(key.clone()).or_insert((session.start, session.teacher));
        if session.start >= entry.0 {
            *entry = (session.start, session.teacher);
        }

        self.progress
            .week_session_placed(week, self.week_row(session));
        self.progress
            .record_session(session.duration_hours());
        self.placed.push((placed.id, placed.session));
    }

    fn apply_relocation(&mut self, moved_from: SessionId, moved_to: Placed) {
        if let Some(entry) = self.placed.iter_mut().find(|(id, _)| *id == moved_from) {
            *entry = (moved_to.id, moved_to.session);
        }
    }

    fn week_row(&self, session: &IndexedSession) -> WeekSessionRow {
        let class_label = session
            .attendees
            .iter()
            .filter_map(|id| self.input.class_groups.get(id))
            .map(|g| g.name.clone())
            .collect::<Vec<_>>()
            .join("+");
        let course_name = self
            .input
            .course(session.course)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| session.course.to_string());
        let teacher = self
            .input
            .teachers
            .get(&session.teacher)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| session.teacher.to_string());
        WeekSessionRow {
            course: course_name,
            class_label,
            subgroup: session.subgroup_label.clone(),
            teacher,
            time: format!(
                "{} {} → {}",
                session.start.format("%d/%m"),
                session.start.format("%H:%M"),
                session.end.format("%H:%M")
            ),
            session_type: session.course_type.label().to_string(),
        }
    }

    fn into_outcome(
        self,
        requested_per_course: HashMap<CourseId, u32>,
        cancelled: bool,
        timed_out: bool,
    ) -> GenerationOutcome {
        let mut failures = Vec::new();
        for queues in &self.queues {
            for series in &queues.series {
                for request in &series.queue {
                    let course_name = self
                        .input
                        .course(request.course)
                        .map(|c| c.name.clone())
                        .unwrap_or_default();
                    failures.push(PlacementFailure {
                        course: request.course,
                        course_name,
                        class_group: request.class_group,
                        subgroup_label: request.subgroup_label.clone(),
                        reason: request
                            .last_rejection
                            .unwrap_or(Rejection::WindowOutOfCoursePeriod),
                    });
                }
            }
        }

        let placed_sessions: Vec<NewSession> = self
            .placed
            .iter()
            .map(|(_, s)| NewSession {
                course: s.course,
                class_group: s.class_group,
                subgroup_label: s.subgroup_label.clone(),
                teacher: s.teacher,
                second_teacher: s.second_teacher,
                room: s.room,
                start: s.start,
                end: s.end,
                attendees: s.attendees.clone(),
            })
            .collect();

        let reports = self
            .input
            .courses
            .iter()
            .map(|course| {
                let placed = self
                    .placed
                    .iter()
                    .filter(|(_, s)| s.course == course.id)
                    .count() as u32;
                let mut messages: Vec<String> = failures
                    .iter()
                    .filter(|f| f.course == course.id)
                    .map(PlacementFailure::describe)
                    .collect();
                messages.extend(
                    self.notices
                        .iter()
                        .filter(|(id, _)| *id == course.id)
                        .map(|(_, msg)| msg.clone()),
                );
                CourseReport {
                    course: course.id,
                    course_name: course.name.clone(),
                    requested: requested_per_course.get(&course.id).copied().unwrap_or(0),
                    placed,
                    messages,
                }
            })
            .collect();

        GenerationOutcome {
            placed: placed_sessions,
            failures,
            reports,
            cancelled,
            timed_out,
        }
    }
}

struct ReleaseSlot {
    course_idx: usize,
    series_idx: usize,
    sort_key: (u8, i32, String, u32),
}

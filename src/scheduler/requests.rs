//! Session request building.
//!
//! Translates each course and its class links into per-series queues of
//! [`SessionRequest`] values. A series is one (course, class-group, subgroup)
//! session sequence: lectures form a single series for the whole course,
//! split practicals form two series per link. Requests carry a tagged
//! [`RequestKind`] so downstream code dispatches on the variant instead of
//! probing optional fields.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::calendar::MAX_SESSION_HOURS;
use crate::models::{ClassGroupId, Course, CourseId, CourseType, Session, TeacherId};

use super::constraints::Rejection;
use super::GenerationInput;

/// Variant payload per course type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Lecture attended jointly by every linked class-group.
    Lecture { attendees: Vec<ClassGroupId> },
    /// Project session taught by an ordered teacher pair.
    Project { pair: (TeacherId, TeacherId) },
    /// Evaluation session.
    Assessment,
    /// Tutorial session.
    Tutorial,
    /// Practical session (the subgroup label lives on the request).
    Practical,
}

/// Identity of a session series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub course: CourseId,
    pub class_group: ClassGroupId,
    pub subgroup_label: Option<String>,
}

/// One session still to place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Build-order sequence number, the final sort tie-break.
    pub seq: u32,
    pub course: CourseId,
    pub class_group: ClassGroupId,
    pub subgroup_label: Option<String>,
    pub kind: RequestKind,
    pub duration_hours: u32,
    pub preferred_teacher: Option<TeacherId>,
    /// Set once the planner offers the request to a week; released requests
    /// are retried every following week until placed.
    pub released: bool,
    pub attempts: u32,
    pub carried_weeks: u32,
    pub last_rejection: Option<Rejection>,
}

impl SessionRequest {
    /// Class-groups attending the session this request would produce.
    pub fn attendees(&self) -> Vec<ClassGroupId> {
        match &self.kind {
            RequestKind::Lecture { attendees } => attendees.clone(),
            _ => vec![self.class_group],
        }
    }
}

/// One series and its pending requests, oldest first.
#[derive(Debug, Clone)]
pub struct SeriesQueue {
    pub key: SeriesKey,
    pub queue: VecDeque<SessionRequest>,
}

/// All series of one course, in link order.
#[derive(Debug, Clone)]
pub struct CourseQueues {
    pub course: CourseId,
    pub series: Vec<SeriesQueue>,
}

impl CourseQueues {
    pub fn pending(&self) -> usize {
        self.series.iter().map(|s| s.queue.len()).sum()
    }
}

/// Eligible teachers of a course: declared course teachers, else the
/// teachers named by its class links, declaration order preserved.
pub fn eligible_teachers(course: &Course) -> Vec<TeacherId> {
    let mut out: Vec<TeacherId> = Vec::new();
    let mut push = |teacher: TeacherId| {
        if !out.contains(&teacher) {
            out.push(teacher);
        }
    };
    for teacher in &course.teachers {
        push(*teacher);
    }
    for link in &course.class_links {
        for teacher in [link.teacher_a, link.teacher_b].into_iter().flatten() {
            push(teacher);
        }
    }
    out
}

/// Preferred teacher pair for a project course: the first link's declared
/// pair, else the first two eligible teachers.
pub fn sae_pair(course: &Course) -> Option<(TeacherId, TeacherId)> {
    for link in &course.class_links {
        if let (Some(a), Some(b)) = (link.teacher_a, link.teacher_b) {
            if a != b {
                return Some((a, b));
            }
        }
    }
    let eligible = eligible_teachers(course);
    match eligible.as_slice() {
        [a, b, ..] => Some((*a, *b)),
        _ => None,
    }
}

/// Build every series queue for the courses in scope. Counts are net of
/// already-persisted sessions, so a rerun over a fully generated course
/// yields empty queues.
pub fn build_requests(input: &GenerationInput) -> Vec<CourseQueues> {
    let mut seq = 0u32;
    let mut out = Vec::with_capacity(input.courses.len());

    for course in &input.courses {
        let mut series = Vec::new();
        // Malformed courses yield empty queues here; validation aborts the
        // run before planning starts.
        if course.class_links.is_empty() {
            out.push(CourseQueues {
                course: course.id,
                series,
            });
            continue;
        }
        match course.course_type {
            CourseType::CM => {
                let attendees: Vec<ClassGroupId> = {
                    let mut seen = Vec::new();
                    for link in &course.class_links {
                        if !seen.contains(&link.class_group) {
                            seen.push(link.class_group);
                        }
                    }
                    seen
                };
                let primary = attendees[0];
                let preferred = course
                    .class_links
                    .first()
                    .and_then(|l| l.teacher_a)
                    .or_else(|| eligible_teachers(course).first().copied());
                series.push(build_series(
                    input,
                    course,
                    primary,
                    None,
                    RequestKind::Lecture { attendees },
                    preferred,
                    &mut seq,
                ));
            }
            CourseType::SAE => {
                for link in &course.class_links {
                    let pair = match (link.teacher_a, link.teacher_b) {
                        (Some(a), Some(b)) if a != b => (a, b),
                        _ => match sae_pair(course) {
                            Some(pair) => pair,
                            None => continue,
                        },
                    };
                    series.push(build_series(
                        input,
                        course,
                        link.class_group,
                        None,
                        RequestKind::Project { pair },
                        Some(pair.0),
                        &mut seq,
                    ));
                }
            }
            CourseType::Eval | CourseType::TD => {
                let kind = if course.course_type == CourseType::Eval {
                    RequestKind::Assessment
                } else {
                    RequestKind::Tutorial
                };
                for link in &course.class_links {
                    let preferred = link
                        .teacher_a
                        .or_else(|| eligible_teachers(course).first().copied());
                    series.push(build_series(
                        input,
                        course,
                        link.class_group,
                        None,
                        kind.clone(),
                        preferred,
                        &mut seq,
                    ));
                }
            }
            CourseType::TP => {
                for link in &course.class_links {
                    if link.is_split() {
                        let fallback = eligible_teachers(course);
                        let teacher_a = link.teacher_a.or_else(|| fallback.first().copied());
                        let teacher_b = link
                            .teacher_b
                            .or_else(|| fallback.get(1).copied())
                            .or(teacher_a);
                        series.push(build_series(
                            input,
                            course,
                            link.class_group,
                            Some(link.subgroup_label_a()),
                            RequestKind::Practical,
                            teacher_a,
                            &mut seq,
                        ));
                        series.push(build_series(
                            input,
                            course,
                            link.class_group,
                            Some(link.subgroup_label_b()),
                            RequestKind::Practical,
                            teacher_b,
                            &mut seq,
                        ));
                    } else {
                        let preferred = link
                            .teacher_a
                            .or_else(|| eligible_teachers(course).first().copied());
                        series.push(build_series(
                            input,
                            course,
                            link.class_group,
                            None,
                            RequestKind::Practical,
                            preferred,
                            &mut seq,
                        ));
                    }
                }
            }
        }
        out.push(CourseQueues {
            course: course.id,
            series,
        });
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn build_series(
    input: &GenerationInput,
    course: &Course,
    class_group: ClassGroupId,
    subgroup_label: Option<String>,
    kind: RequestKind,
    preferred_teacher: Option<TeacherId>,
    seq: &mut u32,
) -> SeriesQueue {
    let key = SeriesKey {
        course: course.id,
        class_group,
        subgroup_label: subgroup_label.clone(),
    };
    let required_hours = course.sessions_required * course.session_length_hours;
    let existing_hours: u32 = input
        .existing_sessions
        .iter()
        .filter(|s| series_matches(course, &key, s))
        .map(Session::duration_hours)
        .sum();
    let mut remaining = required_hours.saturating_sub(existing_hours);
    let chunk = course.session_length_hours.min(MAX_SESSION_HOURS);

    let mut queue = VecDeque::new();
    while remaining > 0 {
        let duration = chunk.min(remaining);
        queue.push_back(SessionRequest {
            seq: *seq,
            course: course.id,
            class_group,
            subgroup_label: subgroup_label.clone(),
            kind: kind.clone(),
            duration_hours: duration,
            preferred_teacher,
            released: false,
            attempts: 0,
            carried_weeks: 0,
            last_rejection: None,
        });
        *seq += 1;
        remaining -= duration;
    }
    SeriesQueue { key, queue }
}

/// Lectures count every session of the course; other series match on class
/// and subgroup.
fn series_matches(course: &Course, key: &SeriesKey, session: &Session) -> bool {
    if session.course != key.course {
        return false;
    }
    match course.course_type {
        CourseType::CM => true,
        _ => {
            session.class_group == key.class_group
                && session.subgroup_label == key.subgroup_label
        }
    }
}

/// Latest persisted session start per series, seeding teacher continuity
/// across generation runs.
pub fn continuity_seed(
    input: &GenerationInput,
) -> std::collections::HashMap<SeriesKey, (NaiveDateTime, TeacherId)> {
    let mut map: std::collections::HashMap<SeriesKey, (NaiveDateTime, TeacherId)> =
        std::collections::HashMap::new();
    for course in &input.courses {
        if course.class_links.is_empty() {
            continue;
        }
        for session in input
            .existing_sessions
            .iter()
            .filter(|s| s.course == course.id)
        {
            let key = SeriesKey {
                course: course.id,
                class_group: match course.course_type {
                    CourseType::CM => course.class_links[0].class_group,
                    _ => session.class_group,
                },
                subgroup_label: match course.course_type {
                    CourseType::CM => None,
                    _ => session.subgroup_label.clone(),
                },
            };
            let entry = map.entry(key).or_insert((session.start, session.teacher));
            if session.start >= entry.0 {
                *entry = (session.start, session.teacher);
            }
        }
    }
    map
}

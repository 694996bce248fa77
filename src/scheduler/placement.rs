//! Placement engine: candidate search for a single request.
//!
//! Candidates are enumerated in a fixed order: working days earliest first,
//! slots in calendar order (1h requests prefer slots adjacent to an existing
//! session of the class), teachers by continuity / preference / declaration
//! order, rooms by ascending capacity (tightest fit) then id. Each full
//! candidate goes through the constraint evaluator. The first `Ok` wins; on
//! exhaustion the most specific rejection seen is returned.

use tracing::debug;

use crate::models::calendar;
use crate::models::{Course, SessionId, TeacherId};

use super::availability::{AvailabilityIndex, IndexedSession};
use super::constraints::{evaluate, Candidate, EvalContext, Rejection};
use super::requests::{RequestKind, SessionRequest};
use super::GenerationInput;

/// Outcome of a successful placement: the provisional session id and a copy
/// of what was inserted into the index.
#[derive(Debug, Clone)]
pub struct Placed {
    pub id: SessionId,
    pub session: IndexedSession,
}

pub struct PlacementContext<'a> {
    pub input: &'a GenerationInput,
    /// Remaining weekly quota for the request's course; `None` = no cap.
    pub quota_remaining: Option<u32>,
    /// Teacher of the previous session in the same series, when known.
    pub continuity_teacher: Option<TeacherId>,
}

/// Search the week for a valid candidate and commit the first one found.
pub fn place_request(
    index: &mut AvailabilityIndex,
    ctx: &PlacementContext<'_>,
    request: &SessionRequest,
    week_start: chrono::NaiveDate,
) -> Result<Placed, Rejection> {
    let course = ctx
        .input
        .course(request.course)
        .expect("request references a scoped course");
    let attendees = request.attendees();
    let mut best = Rejection::WindowOutOfCoursePeriod;
    let keep_best = |rejection: Rejection, best: &mut Rejection| {
        if rejection.specificity() > best.specificity() {
            *best = rejection;
        }
    };

    let pairs = teacher_candidates(ctx, index, course, request, &mut best);
    if pairs.is_empty() {
        return Err(best);
    }

    let mut rooms: Vec<_> = ctx.input.rooms.iter().collect();
    rooms.sort_by_key(|room| (room.capacity, room.id));

    for day in calendar::working_days(week_start, &ctx.input.closings) {
        for (start, end) in ordered_slots(index, request, day) {
            for (teacher, second) in &pairs {
                // Teacher checks once per slot, before the room loop.
                let mut slot_teachers_ok = true;
                for t in std::iter::once(*teacher).chain(*second) {
                    if !index.teacher_available(t, day, start.time(), end.time()) {
                        keep_best(Rejection::TeacherUnavailable, &mut best);
                        slot_teachers_ok = false;
                        break;
                    }
                    if index.teacher_occupied(t, start, end, &[]) {
                        keep_best(Rejection::TeacherBusy, &mut best);
                        slot_teachers_ok = false;
                        break;
                    }
                }
                if !slot_teachers_ok {
                    continue;
                }

                for room in &rooms {
                    let candidate = Candidate {
                        course,
                        class_group: request.class_group,
                        subgroup_label: request.subgroup_label.as_deref(),
                        attendees: &attendees,
                        teacher: *teacher,
                        second_teacher: *second,
                        room,
                        start,
                        end,
                    };
                    let eval_ctx = EvalContext {
                        input: ctx.input,
                        index,
                        quota_remaining: ctx.quota_remaining,
                    };
                    match evaluate(&candidate, &eval_ctx) {
                        Ok(()) => {
                            let session = IndexedSession {
                                id: SessionId::new(0), // assigned on insert
                                course: course.id,
                                course_type: course.course_type,
                                family_key: course.family_key(),
                                class_group: request.class_group,
                                subgroup_label: request.subgroup_label.clone(),
                                teacher: *teacher,
                                second_teacher: *second,
                                room: room.id,
                                start,
                                end,
                                attendees: attendees.clone(),
                            };
                            let id = index.insert_new(session.clone());
                            let mut session = session;
                            session.id = id;
                            return Ok(Placed { id, session });
                        }
                        Err(rejection) => {
                            debug!(
                                course = %course.name,
                                %start,
                                room = %room.name,
                                ?rejection,
                                "candidate rejected"
                            );
                            keep_best(rejection, &mut best);
                        }
                    }
                }
            }
        }
    }
    Err(best)
}

/// Ordered teacher candidates. Project requests enumerate ordered pairs;
/// every other kind enumerates single teachers by continuity, preference,
/// then declaration order. When the course carries hour allocations, only
/// teachers with enough remaining allocated hours are offered.
fn teacher_candidates(
    ctx: &PlacementContext<'_>,
    index: &AvailabilityIndex,
    course: &Course,
    request: &SessionRequest,
    best: &mut Rejection,
) -> Vec<(TeacherId, Option<TeacherId>)> {
    if let RequestKind::Project { pair } = &request.kind {
        let mut pairs: Vec<(TeacherId, Option<TeacherId>)> = vec![(pair.0, Some(pair.1))];
        let eligible = super::requests::eligible_teachers(course);
        for a in &eligible {
            for b in &eligible {
                if a != b && !pairs.contains(&(*a, Some(*b))) {
                    pairs.push((*a, Some(*b)));
                }
            }
        }
        return pairs;
    }

    let mut ordered: Vec<TeacherId> = Vec::new();
    for teacher in ctx
        .continuity_teacher
        .into_iter()
        .chain(request.preferred_teacher)
        .chain(super::requests::eligible_teachers(course))
    {
        if !ordered.contains(&teacher) {
            ordered.push(teacher);
        }
    }

    if !course.teacher_hours.is_empty() {
        let before = ordered.len();
        ordered.retain(|teacher| {
            course.teacher_hours.iter().any(|alloc| {
                alloc.teacher == *teacher
                    && alloc.hours.saturating_sub(index.course_teacher_hours(course.id, *teacher))
                        >= request.duration_hours
            })
        });
        if ordered.is_empty() && before > 0 {
            // Every allocation is exhausted for this duration.
            if Rejection::TeacherLoadExceeded.specificity() > best.specificity() {
                *best = Rejection::TeacherLoadExceeded;
            }
        }
    }

    ordered.into_iter().map(|t| (t, None)).collect()
}

/// Candidate slots for the request on `day`. One-hour requests try slots
/// adjacent to an existing session of the class first, so short sessions
/// pair up with placed blocks instead of fragmenting the day.
fn ordered_slots(
    index: &AvailabilityIndex,
    request: &SessionRequest,
    day: chrono::NaiveDate,
) -> Vec<(chrono::NaiveDateTime, chrono::NaiveDateTime)> {
    let slots = calendar::slots(day, request.duration_hours);
    if request.duration_hours != 1 || slots.is_empty() {
        return slots;
    }
    let existing = index.class_sessions_on(request.class_group, day);
    if existing.is_empty() {
        return slots;
    }
    let occupied: Vec<bool> = slots
        .iter()
        .map(|(start, end)| existing.iter().any(|s| s.start < *end && *start < s.end))
        .collect();
    let paired = |i: usize| {
        (i > 0 && occupied[i - 1]) || (i + 1 < occupied.len() && occupied[i + 1])
    };
    let mut ordered = slots.clone();
    let ranks: std::collections::HashMap<_, _> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| (slot.0, !paired(i)))
        .collect();
    ordered.sort_by_key(|slot| ranks[&slot.0]);
    ordered
}

//! Stateless candidate evaluation.
//!
//! [`evaluate`] checks a fully-specified placement candidate and returns
//! `Ok(())` or the first failing [`Rejection`]. The check order is fixed so
//! rejection reasons are reproducible, cheapest checks first:
//!
//! 1. course window, closed dates, working windows, weekly quota
//! 2. class and teacher structural availability
//! 3. class / teacher / room occupancy, teacher weekly load, chronology
//! 4. room resource fit (capacity, computers, equipment, software)
//!
//! The enum discriminant order doubles as a specificity scale: the placement
//! engine reports the highest-ranked rejection it saw when every candidate
//! fails.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::calendar;
use crate::models::{ClassGroupId, Course, Room, TeacherId};

use super::availability::AvailabilityIndex;
use super::GenerationInput;

/// Typed rejection reason, ordered by specificity (later = more specific).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rejection {
    WindowOutOfCoursePeriod,
    DateClosed,
    OutsideWorkingWindow,
    WeekQuotaReached,
    ClassUnavailable,
    TeacherUnavailable,
    ClassBusy,
    TeacherBusy,
    TeacherLoadExceeded,
    ChronologyViolated,
    RoomBusy,
    CapacityInsufficient,
    ComputersInsufficient,
    EquipmentMissing,
    SoftwareMissing,
}

impl Rejection {
    pub fn describe(self) -> &'static str {
        match self {
            Rejection::WindowOutOfCoursePeriod => "aucune semaine disponible dans la période du cours",
            Rejection::DateClosed => "jour fermé ou hors semaine",
            Rejection::OutsideWorkingWindow => "créneau hors des plages horaires",
            Rejection::WeekQuotaReached => "quota hebdomadaire atteint",
            Rejection::ClassUnavailable => "classe indisponible à cette date",
            Rejection::TeacherUnavailable => "aucun enseignant disponible",
            Rejection::ClassBusy => "classe déjà occupée",
            Rejection::TeacherBusy => "enseignant déjà occupé",
            Rejection::TeacherLoadExceeded => "volume horaire enseignant dépassé",
            Rejection::ChronologyViolated => "ordre CM/TD/TP de la semaine non respecté",
            Rejection::RoomBusy => "salle déjà occupée",
            Rejection::CapacityInsufficient => "capacité de salle insuffisante",
            Rejection::ComputersInsufficient => "postes informatiques insuffisants",
            Rejection::EquipmentMissing => "équipement requis absent",
            Rejection::SoftwareMissing => "logiciel requis absent",
        }
    }

    /// Specificity rank used to keep the most informative rejection.
    pub fn specificity(self) -> u8 {
        self as u8
    }
}

/// A fully-specified placement candidate.
#[derive(Debug)]
pub struct Candidate<'a> {
    pub course: &'a Course,
    pub class_group: ClassGroupId,
    pub subgroup_label: Option<&'a str>,
    /// Every class-group attending (lectures list all linked groups).
    pub attendees: &'a [ClassGroupId],
    pub teacher: TeacherId,
    pub second_teacher: Option<TeacherId>,
    pub room: &'a Room,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Candidate<'_> {
    fn date(&self) -> NaiveDate {
        self.start.date()
    }

    fn duration_hours(&self) -> u32 {
        ((self.end - self.start).num_minutes().max(0) as u32) / 60
    }
}

/// Evaluation context: the snapshot, the live index, and the per-week state
/// the planner tracks.
pub struct EvalContext<'a> {
    pub input: &'a GenerationInput,
    pub index: &'a AvailabilityIndex,
    /// Remaining weekly quota for the candidate's course; `None` = no cap.
    pub quota_remaining: Option<u32>,
}

pub fn evaluate(candidate: &Candidate<'_>, ctx: &EvalContext<'_>) -> Result<(), Rejection> {
    let date = candidate.date();

    // Cheap date checks first.
    if let Some(window) = candidate.course.window {
        if !window.contains(date) {
            return Err(Rejection::WindowOutOfCoursePeriod);
        }
    }
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
        || ctx.input.closings.iter().any(|p| p.span.contains(date))
    {
        return Err(Rejection::DateClosed);
    }
    if !calendar::inside_working_window(candidate.start.time(), candidate.end.time()) {
        return Err(Rejection::OutsideWorkingWindow);
    }
    if ctx.quota_remaining == Some(0) {
        return Err(Rejection::WeekQuotaReached);
    }

    // Structural availability.
    for attendee in candidate.attendees {
        let group = ctx
            .input
            .class_groups
            .get(attendee)
            .ok_or(Rejection::ClassUnavailable)?;
        if group.unavailable.iter().any(|span| span.contains(date)) {
            return Err(Rejection::ClassUnavailable);
        }
    }
    for teacher in teachers(candidate) {
        if !ctx
            .index
            .teacher_available(teacher, date, candidate.start.time(), candidate.end.time())
        {
            return Err(Rejection::TeacherUnavailable);
        }
    }

    // Occupancy.
    for attendee in candidate.attendees {
        if ctx.index.class_occupied(
            *attendee,
            candidate.subgroup_label,
            candidate.start,
            candidate.end,
            &[],
        ) {
            return Err(Rejection::ClassBusy);
        }
    }
    for teacher in teachers(candidate) {
        if ctx
            .index
            .teacher_occupied(teacher, candidate.start, candidate.end, &[])
        {
            return Err(Rejection::TeacherBusy);
        }
    }
    for teacher in teachers(candidate) {
        if let Some(max) = ctx
            .input
            .teachers
            .get(&teacher)
            .and_then(|t| t.max_weekly_hours)
        {
            let week = calendar::week_start(date);
            if ctx.index.teacher_week_hours(teacher, week) + candidate.duration_hours() > max {
                return Err(Rejection::TeacherLoadExceeded);
            }
        }
    }
    if let Some(family) = candidate.course.family_key() {
        let rank = candidate.course.course_type.priority_rank();
        for attendee in candidate.attendees {
            if ctx
                .index
                .breaks_weekly_chronology(&family, *attendee, rank, candidate.start)
            {
                return Err(Rejection::ChronologyViolated);
            }
        }
    }
    if ctx
        .index
        .room_occupied(candidate.room.id, candidate.start, candidate.end, &[])
    {
        return Err(Rejection::RoomBusy);
    }

    // Resource fit.
    let headcount: u32 = candidate
        .attendees
        .iter()
        .filter_map(|id| ctx.input.class_groups.get(id))
        .map(|group| group.attending_size(candidate.subgroup_label.is_some()))
        .sum();
    if candidate.room.capacity < headcount {
        return Err(Rejection::CapacityInsufficient);
    }
    if candidate.room.computers < candidate.course.computers_required {
        return Err(Rejection::ComputersInsufficient);
    }
    if !candidate
        .course
        .required_equipment
        .is_subset(&candidate.room.equipment)
    {
        return Err(Rejection::EquipmentMissing);
    }
    if !candidate
        .course
        .required_software
        .is_subset(&candidate.room.software)
    {
        return Err(Rejection::SoftwareMissing);
    }

    Ok(())
}

fn teachers<'a>(candidate: &'a Candidate<'a>) -> impl Iterator<Item = TeacherId> + 'a {
    std::iter::once(candidate.teacher).chain(candidate.second_teacher)
}

//! Snapshot entities loaded once per generation run.
//!
//! These are plain data carriers: relationships are expressed through typed
//! ids and resolved via the lookup tables in
//! [`crate::scheduler::GenerationInput`].

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::ids::{ClassGroupId, CourseId, RoomId, SessionId, TeacherId};

/// Course session type, in placement-priority order (lectures first).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseType {
    /// Lecture attended jointly by every linked class-group.
    CM,
    /// Project/integration session run by a pair of teachers.
    SAE,
    /// Evaluation/exam session.
    Eval,
    /// Tutorial, one teacher per class-group.
    TD,
    /// Practical/lab session, optionally split into two subgroups.
    TP,
}

impl CourseType {
    /// Placement priority rank: CM < SAE < Eval < TD < TP.
    pub fn priority_rank(self) -> u8 {
        match self {
            CourseType::CM => 0,
            CourseType::SAE => 1,
            CourseType::Eval => 2,
            CourseType::TD => 3,
            CourseType::TP => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CourseType::CM => "CM",
            CourseType::SAE => "SAE",
            CourseType::Eval => "Eval",
            CourseType::TD => "TD",
            CourseType::TP => "TP",
        }
    }

    /// Types eligible for relocation when a placement attempt fails.
    pub fn relocatable(self) -> bool {
        matches!(self, CourseType::TD | CourseType::TP)
    }
}

impl std::fmt::Display for CourseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive date range.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Recurring weekly availability interval for a teacher.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyInterval {
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
    /// Per-weekday availability intervals.
    pub weekly_availability: Vec<WeeklyInterval>,
    /// Daily global window intersected with every weekly interval, when set.
    pub daily_window: Option<(NaiveTime, NaiveTime)>,
    /// Specific date ranges during which the teacher is unavailable.
    pub unavailable: Vec<DateSpan>,
    /// Hard cap on placed hours within one ISO week, when set.
    pub max_weekly_hours: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassGroup {
    pub id: ClassGroupId,
    pub name: String,
    pub size: u32,
    /// Date ranges during which the whole group is unavailable.
    pub unavailable: Vec<DateSpan>,
}

impl ClassGroup {
    /// Headcount attending a session, halved (rounded up) for a subgroup.
    pub fn attending_size(&self, subgroup: bool) -> u32 {
        if subgroup {
            self.size.div_ceil(2)
        } else {
            self.size
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: u32,
    pub computers: u32,
    pub equipment: BTreeSet<String>,
    pub software: BTreeSet<String>,
}

/// Link between a course and one of its class-groups.
///
/// `group_count == 2` splits the class into subgroups A and B, each running
/// its own session series with its own preferred teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseClassLink {
    pub class_group: ClassGroupId,
    pub group_count: u8,
    pub teacher_a: Option<TeacherId>,
    pub teacher_b: Option<TeacherId>,
    pub label_a: Option<String>,
    pub label_b: Option<String>,
}

impl CourseClassLink {
    pub fn whole_class(class_group: ClassGroupId) -> Self {
        Self {
            class_group,
            group_count: 1,
            teacher_a: None,
            teacher_b: None,
            label_a: None,
            label_b: None,
        }
    }

    pub fn is_split(&self) -> bool {
        self.group_count == 2
    }

    pub fn subgroup_label_a(&self) -> String {
        self.label_a.clone().unwrap_or_else(|| "A".to_string())
    }

    pub fn subgroup_label_b(&self) -> String {
        self.label_b.clone().unwrap_or_else(|| "B".to_string())
    }
}

/// Explicit (teacher, hours) allocation for a course.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherHourAllocation {
    pub teacher: TeacherId,
    pub hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub course_type: CourseType,
    /// Base name shared across the CM/TD/TP declinations of one subject.
    pub family: Option<String>,
    pub session_length_hours: u32,
    pub sessions_required: u32,
    /// Planning window; sessions are only placed inside it.
    pub window: Option<DateSpan>,
    /// Scheduling priority, ascending (1 is scheduled before 2).
    pub priority: i32,
    /// Eligible teachers in declaration order.
    pub teachers: Vec<TeacherId>,
    /// Optional per-teacher hour allocations; when non-empty, only teachers
    /// with remaining allocated hours are offered to the placement engine.
    pub teacher_hours: Vec<TeacherHourAllocation>,
    pub class_links: Vec<CourseClassLink>,
    pub required_equipment: BTreeSet<String>,
    pub required_software: BTreeSet<String>,
    pub computers_required: u32,
    /// Allow sessions longer than one working window to be emitted as 2h
    /// chunks instead of failing validation.
    pub split_long_sessions: bool,
}

impl Course {
    /// Key grouping the CM/TD/TP declinations of one subject for the weekly
    /// chronology rule. Falls back to the middle segment of a
    /// `"TYPE - Name - SEM"` display name when no family is configured.
    pub fn family_key(&self) -> Option<String> {
        if let Some(family) = &self.family {
            return Some(family.to_lowercase());
        }
        let parts: Vec<&str> = self.name.split(" - ").collect();
        if parts.len() >= 3 {
            return Some(parts[1..parts.len() - 1].join(" - ").to_lowercase());
        }
        None
    }
}

/// Global date range excluded from any placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingPeriod {
    pub span: DateSpan,
    pub label: Option<String>,
}

/// Opt-in week restriction for a course, with an optional per-week cap.
///
/// A course without any entry may place sessions in any week of its window;
/// an entry with `quota == None` allows the week without a numeric cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedWeek {
    pub course: CourseId,
    /// Monday of the allowed ISO week.
    pub week_start: NaiveDate,
    pub quota: Option<u32>,
}

/// A placed session, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub course: CourseId,
    /// Primary class-group (the scheduling unit the session was placed for).
    pub class_group: ClassGroupId,
    pub subgroup_label: Option<String>,
    pub teacher: TeacherId,
    /// Secondary teacher attendance (SAE sessions).
    pub second_teacher: Option<TeacherId>,
    pub room: RoomId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Every class-group attending (lectures list all linked groups).
    pub attendees: Vec<ClassGroupId>,
}

impl Session {
    pub fn duration_hours(&self) -> u32 {
        ((self.end - self.start).num_minutes().max(0) as u32) / 60
    }

    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && start < self.end
    }
}

/// Session payload handed to the repository for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub course: CourseId,
    pub class_group: ClassGroupId,
    pub subgroup_label: Option<String>,
    pub teacher: TeacherId,
    pub second_teacher: Option<TeacherId>,
    pub room: RoomId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attendees: Vec<ClassGroupId>,
}

/// Outcome status of one course within a generation run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleLogStatus {
    Success,
    Warning,
    Error,
}

/// Generation log entry appended per course at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScheduleLog {
    pub course: CourseId,
    pub status: ScheduleLogStatus,
    pub summary: String,
    pub messages: Vec<String>,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

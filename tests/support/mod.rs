//! Shared fixtures for integration tests: entity builders over the
//! in-memory repository and the universal output invariants.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use chronos::models::calendar;
use chronos::models::{
    ClassGroup, ClassGroupId, Course, CourseClassLink, CourseId, CourseType, DateSpan, Room,
    RoomId, Session, Teacher, TeacherId, WeeklyInterval,
};

pub const ALL_WEEK: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Morning + afternoon availability for the given weekdays.
pub fn day_availability(weekdays: &[Weekday]) -> Vec<WeeklyInterval> {
    weekdays
        .iter()
        .flat_map(|weekday| {
            [
                WeeklyInterval {
                    weekday: *weekday,
                    start: time(8, 0),
                    end: time(12, 15),
                },
                WeeklyInterval {
                    weekday: *weekday,
                    start: time(13, 30),
                    end: time(17, 45),
                },
            ]
        })
        .collect()
}

pub fn teacher(id: i64, name: &str, weekdays: &[Weekday]) -> Teacher {
    Teacher {
        id: TeacherId::new(id),
        name: name.into(),
        weekly_availability: day_availability(weekdays),
        daily_window: None,
        unavailable: vec![],
        max_weekly_hours: None,
    }
}

pub fn class_group(id: i64, name: &str, size: u32) -> ClassGroup {
    ClassGroup {
        id: ClassGroupId::new(id),
        name: name.into(),
        size,
        unavailable: vec![],
    }
}

pub fn room(id: i64, name: &str, capacity: u32, computers: u32) -> Room {
    Room {
        id: RoomId::new(id),
        name: name.into(),
        capacity,
        computers,
        equipment: BTreeSet::new(),
        software: BTreeSet::new(),
    }
}

pub fn link(class: i64, teacher_a: Option<i64>, teacher_b: Option<i64>, split: bool) -> CourseClassLink {
    CourseClassLink {
        class_group: ClassGroupId::new(class),
        group_count: if split { 2 } else { 1 },
        teacher_a: teacher_a.map(TeacherId::new),
        teacher_b: teacher_b.map(TeacherId::new),
        label_a: None,
        label_b: None,
    }
}

#[allow(clippy::too_many_arguments)]
pub fn course(
    id: i64,
    name: &str,
    course_type: CourseType,
    length: u32,
    required: u32,
    window: DateSpan,
    teachers: Vec<i64>,
    links: Vec<CourseClassLink>,
) -> Course {
    Course {
        id: CourseId::new(id),
        name: name.into(),
        course_type,
        family: None,
        session_length_hours: length,
        sessions_required: required,
        window: Some(window),
        priority: 1,
        teachers: teachers.into_iter().map(TeacherId::new).collect(),
        teacher_hours: vec![],
        class_links: links,
        required_equipment: BTreeSet::new(),
        required_software: BTreeSet::new(),
        computers_required: 0,
        split_long_sessions: false,
    }
}

fn class_conflict(a: &Session, b: &Session) -> bool {
    let shared = a.attendees.iter().any(|g| b.attendees.contains(g));
    if !shared {
        return false;
    }
    match (&a.subgroup_label, &b.subgroup_label) {
        (Some(la), Some(lb)) => la == lb,
        _ => true,
    }
}

fn teachers_of(session: &Session) -> Vec<TeacherId> {
    let mut out = vec![session.teacher];
    if let Some(second) = session.second_teacher {
        out.push(second);
    }
    out
}

/// The universal invariants every generation output must satisfy.
pub fn assert_universal_invariants(sessions: &[Session]) {
    for session in sessions {
        assert!(
            calendar::inside_working_window(session.start.time(), session.end.time()),
            "session {:?} lies outside the working windows",
            session
        );
        assert!(
            !matches!(session.start.date().weekday(), Weekday::Sat | Weekday::Sun),
            "session {:?} falls on a weekend",
            session
        );
        assert_eq!(session.start.date(), session.end.date());
    }

    for (i, a) in sessions.iter().enumerate() {
        for b in sessions.iter().skip(i + 1) {
            if !(a.start < b.end && b.start < a.end) {
                continue;
            }
            assert!(
                !(a.room == b.room),
                "room double-booked: {:?} vs {:?}",
                a,
                b
            );
            let teachers_a = teachers_of(a);
            assert!(
                !teachers_of(b).iter().any(|t| teachers_a.contains(t)),
                "teacher double-booked: {:?} vs {:?}",
                a,
                b
            );
            assert!(
                !class_conflict(a, b),
                "class double-booked: {:?} vs {:?}",
                a,
                b
            );
        }
    }
}

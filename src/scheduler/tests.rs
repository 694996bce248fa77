//! Planner-level tests: priority ordering, carry-over, quotas, relocation,
//! determinism. Fixtures build the snapshot tables directly; persistence is
//! not involved at this level.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use crate::models::{
    AllowedWeek, ClassGroup, ClassGroupId, ClosingPeriod, Course, CourseClassLink, CourseId,
    CourseType, DateSpan, NewSession, Room, RoomId, Teacher, TeacherId, WeeklyInterval,
};
use crate::services::progress::NullProgress;

use super::{GenerationInput, GenerationOutcome, RunControl, SchedulerError, WeeklyPlanner};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn availability(weekdays: &[Weekday], start: NaiveTime, end: NaiveTime) -> Vec<WeeklyInterval> {
    weekdays
        .iter()
        .flat_map(|weekday| {
            [
                WeeklyInterval {
                    weekday: *weekday,
                    start,
                    end: end.min(time(12, 15)),
                },
                WeeklyInterval {
                    weekday: *weekday,
                    start: time(13, 30).max(start),
                    end,
                },
            ]
        })
        .filter(|interval| interval.start < interval.end)
        .collect()
}

fn teacher(id: i64, name: &str, weekdays: &[Weekday]) -> Teacher {
    Teacher {
        id: TeacherId::new(id),
        name: name.into(),
        weekly_availability: availability(weekdays, time(8, 0), time(17, 45)),
        daily_window: None,
        unavailable: vec![],
        max_weekly_hours: None,
    }
}

const ALL_WEEK: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

fn class_group(id: i64, name: &str, size: u32) -> ClassGroup {
    ClassGroup {
        id: ClassGroupId::new(id),
        name: name.into(),
        size,
        unavailable: vec![],
    }
}

fn room(id: i64, name: &str, capacity: u32, computers: u32) -> Room {
    Room {
        id: RoomId::new(id),
        name: name.into(),
        capacity,
        computers,
        equipment: BTreeSet::new(),
        software: BTreeSet::new(),
    }
}

#[allow(clippy::too_many_arguments)]
fn course(
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

fn input(
    courses: Vec<Course>,
    teachers: Vec<Teacher>,
    class_groups: Vec<ClassGroup>,
    rooms: Vec<Room>,
    window: DateSpan,
) -> GenerationInput {
    let course_meta = courses
        .iter()
        .map(|c| {
            (
                c.id,
                super::CourseMeta {
                    name: c.name.clone(),
                    course_type: c.course_type,
                    family_key: c.family_key(),
                },
            )
        })
        .collect();
    GenerationInput {
        courses,
        teachers: teachers.into_iter().map(|t| (t.id, t)).collect(),
        class_groups: class_groups.into_iter().map(|g| (g.id, g)).collect(),
        rooms,
        closings: vec![],
        existing_sessions: vec![],
        course_meta,
        allowed_weeks: HashMap::new(),
        window,
    }
}

fn run(input: &GenerationInput) -> GenerationOutcome {
    WeeklyPlanner::new(input, &NullProgress, &RunControl::unbounded())
        .run()
        .expect("planner run")
}

fn weeks_of(sessions: &[NewSession]) -> Vec<NaiveDate> {
    sessions
        .iter()
        .map(|s| crate::models::calendar::week_start(s.start.date()))
        .collect()
}

// ----------------------------------------------------------------------
// Core placement scenarios at planner level
// ----------------------------------------------------------------------

#[test]
fn single_td_spreads_over_distinct_monday_weeks() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 11, 21));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let input = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            4,
            window,
            vec![1],
            vec![link],
        )],
        vec![teacher(
            1,
            "T1",
            &[Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu],
        )],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );

    let outcome = run(&input);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.placed.len(), 4);

    let weeks: BTreeSet<NaiveDate> = weeks_of(&outcome.placed).into_iter().collect();
    assert_eq!(weeks.len(), 4, "sessions must land on distinct weeks");
    for session in &outcome.placed {
        assert_eq!(session.start.date().weekday(), Weekday::Mon);
        assert_eq!(session.start.time(), time(8, 0));
        assert_eq!(session.end.time(), time(10, 0));
        assert_eq!(session.teacher, TeacherId::new(1));
        assert_eq!(session.room, RoomId::new(15));
    }
}

#[test]
fn split_tp_runs_both_subgroups_in_parallel() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 11, 21));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 2,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: Some(TeacherId::new(2)),
        label_a: None,
        label_b: None,
    };
    let input = input(
        vec![course(
            1,
            "TP - Programmation - S1",
            CourseType::TP,
            2,
            4,
            window,
            vec![1, 2],
            vec![link],
        )],
        vec![teacher(1, "T1", &ALL_WEEK), teacher(2, "T2", &ALL_WEEK)],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20), room(19, "R19", 20, 20)],
        window,
    );

    let outcome = run(&input);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.placed.len(), 8);

    let per_label = |label: &str| {
        outcome
            .placed
            .iter()
            .filter(|s| s.subgroup_label.as_deref() == Some(label))
            .count()
    };
    assert_eq!(per_label("A"), 4);
    assert_eq!(per_label("B"), 4);

    // Same-slot pairs use distinct rooms and distinct teachers.
    for a in outcome
        .placed
        .iter()
        .filter(|s| s.subgroup_label.as_deref() == Some("A"))
    {
        for b in outcome
            .placed
            .iter()
            .filter(|s| s.subgroup_label.as_deref() == Some("B"))
        {
            if a.start == b.start {
                assert_ne!(a.room, b.room);
                assert_ne!(a.teacher, b.teacher);
            }
        }
    }
}

#[test]
fn teacher_date_unavailability_pushes_to_next_working_day() {
    let window = DateSpan::new(date(2025, 10, 20), date(2025, 10, 24));
    let mut t1 = teacher(1, "T1", &ALL_WEEK);
    t1.unavailable = vec![DateSpan::new(date(2025, 10, 20), date(2025, 10, 21))];
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let input = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            1,
            window,
            vec![1],
            vec![link],
        )],
        vec![t1],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );

    let outcome = run(&input);
    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].start.date(), date(2025, 10, 22));
}

fn relocation_world(td_teacher_until: NaiveTime) -> GenerationInput {
    let window = DateSpan::new(date(2025, 9, 8), date(2025, 9, 19));
    let t1 = Teacher {
        id: TeacherId::new(1),
        name: "T1".into(),
        weekly_availability: availability(&[Weekday::Mon], time(8, 0), td_teacher_until),
        daily_window: None,
        unavailable: vec![],
        max_weekly_hours: None,
    };
    // The TP teacher never reaches the last working window of the day.
    let t2 = Teacher {
        id: TeacherId::new(2),
        name: "T2".into(),
        weekly_availability: availability(&[Weekday::Mon], time(8, 0), time(15, 30)),
        daily_window: None,
        unavailable: vec![],
        max_weekly_hours: None,
    };
    let link = |teacher: i64| CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(teacher)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let mut tp = course(
        5,
        "TP - Systèmes - S1",
        CourseType::TP,
        2,
        1,
        window,
        vec![2],
        vec![link(2)],
    );
    tp.computers_required = 20;
    let courses = vec![
        course(2, "TD - Anglais - S1", CourseType::TD, 2, 1, window, vec![1], vec![link(1)]),
        course(3, "TD - Droit - S1", CourseType::TD, 2, 1, window, vec![1], vec![link(1)]),
        course(4, "TD - Gestion - S1", CourseType::TD, 2, 1, window, vec![1], vec![link(1)]),
        tp,
    ];
    input(
        courses,
        vec![t1, t2],
        vec![class_group(1, "A2", 20)],
        // The lab is the tightest fit, so tutorials grab it first.
        vec![room(15, "R15", 30, 20), room(16, "R16", 40, 0)],
        window,
    )
}

#[test]
fn relocation_moves_a_tutorial_to_free_the_lab() {
    // Tutorials fill the lab over the three slots the TP teacher can attend;
    // the TD teacher stays available all day, so one tutorial can move.
    let input = relocation_world(time(17, 45));
    let outcome = run(&input);

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.placed.len(), 4);

    let tp = outcome
        .placed
        .iter()
        .find(|s| s.course == CourseId::new(5))
        .expect("TP placed");
    assert_eq!(tp.start.date(), date(2025, 9, 8));
    assert_eq!(tp.start.time(), time(8, 0));
    assert_eq!(tp.room, RoomId::new(15));

    // The displaced tutorial moved to the late slot its teacher still covers.
    let moved = outcome
        .placed
        .iter()
        .find(|s| s.course == CourseId::new(2))
        .expect("moved tutorial");
    assert_eq!(moved.start.time(), time(15, 45));

    // Output order is stable: the moved tutorial keeps its original position.
    assert_eq!(outcome.placed[0].course, CourseId::new(2));
}

#[test]
fn failed_relocation_carries_the_request_to_next_week() {
    // The TD teacher stops at 15:30 too: no tutorial can move anywhere, so
    // the TP request is carried and lands on the following Monday.
    let input = relocation_world(time(15, 30));
    let outcome = run(&input);

    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let tp = outcome
        .placed
        .iter()
        .find(|s| s.course == CourseId::new(5))
        .expect("TP placed");
    assert_eq!(tp.start.date(), date(2025, 9, 15));
    assert_eq!(tp.start.time(), time(8, 0));

    // Tutorials stayed where they were first placed.
    for td in outcome.placed.iter().filter(|s| s.course != CourseId::new(5)) {
        assert_eq!(td.start.date(), date(2025, 9, 8));
    }
}

#[test]
fn closing_period_skips_whole_weeks() {
    let window = DateSpan::new(date(2025, 12, 15), date(2026, 1, 16));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let mut world = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            2,
            window,
            vec![1],
            vec![link],
        )],
        vec![teacher(1, "T1", &ALL_WEEK)],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );
    world.closings = vec![ClosingPeriod {
        span: DateSpan::new(date(2025, 12, 22), date(2026, 1, 2)),
        label: Some("Vacances de Noël".into()),
    }];

    let outcome = run(&world);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let dates: Vec<NaiveDate> = outcome.placed.iter().map(|s| s.start.date()).collect();
    assert_eq!(dates, vec![date(2025, 12, 15), date(2026, 1, 5)]);
}

// ----------------------------------------------------------------------
// Ordering, quotas, carry-over
// ----------------------------------------------------------------------

#[test]
fn lectures_are_placed_before_tutorials() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 10, 17));
    let link = || CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let input = input(
        vec![
            course(1, "TD - Algèbre - S1", CourseType::TD, 2, 1, window, vec![1], vec![link()]),
            course(2, "CM - Analyse - S1", CourseType::CM, 2, 1, window, vec![1], vec![link()]),
        ],
        vec![teacher(1, "T1", &ALL_WEEK)],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );

    let outcome = run(&input);
    assert_eq!(outcome.placed.len(), 2);
    // The lecture won the earliest slot despite its higher course id.
    assert_eq!(outcome.placed[0].course, CourseId::new(2));
    assert_eq!(outcome.placed[0].start.time(), time(8, 0));
    assert_eq!(outcome.placed[1].start.time(), time(10, 15));
}

#[test]
fn weekly_chronology_keeps_tutorials_after_the_lecture() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 10, 17));
    let link = |teacher: i64| CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(teacher)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    // The lecture teacher only works Wednesdays, so the lecture lands there;
    // the tutorial shares the course family and may not precede it.
    let input = input(
        vec![
            course(1, "CM - Analyse - S1", CourseType::CM, 2, 1, window, vec![2], vec![link(2)]),
            course(2, "TD - Analyse - S1", CourseType::TD, 2, 1, window, vec![1], vec![link(1)]),
        ],
        vec![teacher(1, "T1", &ALL_WEEK), teacher(2, "T2", &[Weekday::Wed])],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20), room(16, "R16", 30, 0)],
        window,
    );

    let outcome = run(&input);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let cm = outcome.placed.iter().find(|s| s.course == CourseId::new(1)).unwrap();
    let td = outcome.placed.iter().find(|s| s.course == CourseId::new(2)).unwrap();
    assert_eq!(cm.start.date(), date(2025, 10, 15));
    assert!(td.start > cm.start, "tutorial must follow the lecture");
}

#[test]
fn carried_request_doubles_up_the_following_week() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 10, 24));
    let mut t1 = teacher(1, "T1", &ALL_WEEK);
    // The whole first week is blocked for the teacher.
    t1.unavailable = vec![DateSpan::new(date(2025, 10, 13), date(2025, 10, 17))];
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let input = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            2,
            window,
            vec![1],
            vec![link],
        )],
        vec![t1],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );

    let outcome = run(&input);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.placed.len(), 2);
    // Both sessions land in the second week: the carried one plus the fresh one.
    for session in &outcome.placed {
        assert_eq!(
            crate::models::calendar::week_start(session.start.date()),
            date(2025, 10, 20)
        );
    }
}

#[test]
fn allowed_weeks_restrict_and_quota_paces() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 11, 21));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let mut world = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            4,
            window,
            vec![1],
            vec![link],
        )],
        vec![teacher(1, "T1", &ALL_WEEK)],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );
    world.allowed_weeks.insert(
        CourseId::new(1),
        vec![
            AllowedWeek {
                course: CourseId::new(1),
                week_start: date(2025, 10, 20),
                quota: Some(2),
            },
            AllowedWeek {
                course: CourseId::new(1),
                week_start: date(2025, 11, 3),
                quota: Some(2),
            },
        ],
    );

    let outcome = run(&world);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    let mut weeks = weeks_of(&outcome.placed);
    weeks.sort();
    assert_eq!(
        weeks,
        vec![
            date(2025, 10, 20),
            date(2025, 10, 20),
            date(2025, 11, 3),
            date(2025, 11, 3)
        ]
    );
}

#[test]
fn teacher_hour_allocations_split_the_series() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 11, 7));
    let link = CourseClassLink::whole_class(ClassGroupId::new(1));
    let mut algorithmique = course(
        1,
        "TD - Algorithmique - S1",
        CourseType::TD,
        2,
        3,
        window,
        vec![1, 2],
        vec![link],
    );
    algorithmique.teacher_hours = vec![
        crate::models::entities::TeacherHourAllocation {
            teacher: TeacherId::new(1),
            hours: 2,
        },
        crate::models::entities::TeacherHourAllocation {
            teacher: TeacherId::new(2),
            hours: 4,
        },
    ];
    let input = input(
        vec![algorithmique],
        vec![teacher(1, "Alice", &ALL_WEEK), teacher(2, "Bruno", &ALL_WEEK)],
        vec![class_group(1, "INFO1", 24)],
        vec![room(15, "B204", 30, 0)],
        window,
    );

    let outcome = run(&input);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.placed.len(), 3);
    let hours = |teacher: i64| -> u32 {
        outcome
            .placed
            .iter()
            .filter(|s| s.teacher == TeacherId::new(teacher))
            .map(|s| ((s.end - s.start).num_hours()) as u32)
            .sum()
    };
    assert_eq!(hours(1), 2);
    assert_eq!(hours(2), 4);
}

#[test]
fn one_hour_sessions_pair_with_existing_blocks() {
    let window = DateSpan::new(date(2025, 9, 8), date(2025, 9, 12));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let mut world = input(
        vec![course(
            1,
            "TD - Algorithmique - S1",
            CourseType::TD,
            1,
            1,
            window,
            vec![1],
            vec![link],
        )],
        vec![teacher(1, "Alice", &ALL_WEEK)],
        vec![class_group(1, "INFO1", 24)],
        vec![room(1, "A101", 30, 0)],
        window,
    );
    // An existing block at 10:15 pulls the new 1h session next to it.
    world.course_meta.insert(
        CourseId::new(99),
        super::CourseMeta {
            name: "TD - Communication - S1".into(),
            course_type: CourseType::TD,
            family_key: Some("communication".into()),
        },
    );
    world.existing_sessions = vec![crate::models::Session {
        id: crate::models::SessionId::new(1),
        course: CourseId::new(99),
        class_group: ClassGroupId::new(1),
        subgroup_label: None,
        teacher: TeacherId::new(1),
        second_teacher: None,
        room: RoomId::new(1),
        start: date(2025, 9, 8).and_time(time(10, 15)),
        end: date(2025, 9, 8).and_time(time(11, 15)),
        attendees: vec![ClassGroupId::new(1)],
    }];

    let outcome = run(&world);
    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].start, date(2025, 9, 8).and_time(time(9, 0)));
    assert_eq!(outcome.placed[0].end, date(2025, 9, 8).and_time(time(10, 0)));
}

// ----------------------------------------------------------------------
// Determinism and error paths
// ----------------------------------------------------------------------

#[test]
fn identical_inputs_produce_identical_outputs() {
    let input = relocation_world(time(17, 45));
    let first = run(&input);
    let second = run(&input);
    assert_eq!(first.placed, second.placed);
}

#[test]
fn rerun_over_persisted_output_places_nothing() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 11, 21));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let mut world = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            2,
            window,
            vec![1],
            vec![link],
        )],
        vec![teacher(1, "T1", &ALL_WEEK)],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );

    let first = run(&world);
    assert_eq!(first.placed.len(), 2);

    // Feed the first run's output back as persisted sessions.
    world.existing_sessions = first
        .placed
        .iter()
        .enumerate()
        .map(|(i, s)| crate::models::Session {
            id: crate::models::SessionId::new(i as i64 + 1),
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

    let second = run(&world);
    assert!(second.placed.is_empty());
    assert!(second.failures.is_empty());
}

#[test]
fn course_without_class_link_aborts() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 10, 17));
    let world = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            1,
            window,
            vec![1],
            vec![],
        )],
        vec![teacher(1, "T1", &ALL_WEEK)],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );
    let result = WeeklyPlanner::new(&world, &NullProgress, &RunControl::unbounded()).run();
    assert!(matches!(result, Err(SchedulerError::DataInconsistency(_))));
}

#[test]
fn fully_closed_window_aborts() {
    let window = DateSpan::new(date(2025, 12, 22), date(2025, 12, 26));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let mut world = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            1,
            window,
            vec![1],
            vec![link],
        )],
        vec![teacher(1, "T1", &ALL_WEEK)],
        vec![class_group(1, "A2", 20)],
        vec![room(15, "R15", 20, 20)],
        window,
    );
    world.closings = vec![ClosingPeriod {
        span: window,
        label: None,
    }];
    let result = WeeklyPlanner::new(&world, &NullProgress, &RunControl::unbounded()).run();
    assert!(matches!(result, Err(SchedulerError::WindowEmpty)));
}

#[test]
fn unplaced_requests_surface_with_their_last_reason() {
    // Room too small for the class: every candidate fails on capacity.
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 10, 17));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let world = input(
        vec![course(
            1,
            "TD - Réseaux - S1",
            CourseType::TD,
            2,
            1,
            window,
            vec![1],
            vec![link],
        )],
        vec![teacher(1, "T1", &ALL_WEEK)],
        vec![class_group(1, "A2", 35)],
        vec![room(15, "R15", 20, 20)],
        window,
    );
    let outcome = run(&world);
    assert!(outcome.placed.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(
        outcome.failures[0].reason,
        super::Rejection::CapacityInsufficient
    );
}

#[test]
fn sae_sessions_carry_both_teachers() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 10, 17));
    let link = CourseClassLink {
        class_group: ClassGroupId::new(1),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: Some(TeacherId::new(2)),
        label_a: None,
        label_b: None,
    };
    let world = input(
        vec![course(
            1,
            "SAE - Gestion de projet - S1",
            CourseType::SAE,
            2,
            1,
            window,
            vec![1, 2],
            vec![link],
        )],
        vec![teacher(1, "Alice", &ALL_WEEK), teacher(2, "Bruno", &ALL_WEEK)],
        vec![class_group(1, "INFO1", 26)],
        vec![room(15, "SAE-1", 28, 0)],
        window,
    );
    let outcome = run(&world);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].teacher, TeacherId::new(1));
    assert_eq!(outcome.placed[0].second_teacher, Some(TeacherId::new(2)));
}

#[test]
fn lecture_room_must_hold_every_class() {
    let window = DateSpan::new(date(2025, 10, 13), date(2025, 10, 17));
    let link = |class: i64| CourseClassLink {
        class_group: ClassGroupId::new(class),
        group_count: 1,
        teacher_a: Some(TeacherId::new(1)),
        teacher_b: None,
        label_a: None,
        label_b: None,
    };
    let world = input(
        vec![course(
            1,
            "CM - Analyse - S1",
            CourseType::CM,
            2,
            1,
            window,
            vec![1],
            vec![link(1), link(2)],
        )],
        vec![teacher(1, "T1", &ALL_WEEK)],
        vec![class_group(1, "INFO1", 28), class_group(2, "INFO2", 26)],
        // Only the amphitheatre can hold 54 students.
        vec![room(15, "B101", 30, 0), room(16, "Amphi A", 120, 0)],
        window,
    );
    let outcome = run(&world);
    assert!(outcome.failures.is_empty(), "{:?}", outcome.failures);
    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].room, RoomId::new(16));
    assert_eq!(
        outcome.placed[0].attendees,
        vec![ClassGroupId::new(1), ClassGroupId::new(2)]
    );
}

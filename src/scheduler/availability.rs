//! Per-run availability index.
//!
//! Built once per generation from the snapshot tables, then mutated in
//! memory as the planner places sessions. The index answers the three
//! point-queries of the constraint evaluator (teacher/class/room) and keeps
//! enough metadata per occupied slot to drive the weekly chronology rule and
//! the teacher-hour allocation accounting.
//!
//! [`AvailabilityIndex::checkpoint`] / [`AvailabilityIndex::restore`] give
//! the relocation engine its transactional guarantee: either both sides of a
//! swap land, or the index returns to its prior state.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::calendar;
use crate::models::{
    ClassGroupId, CourseId, CourseType, RoomId, Session, SessionId, TeacherId,
};

use super::GenerationInput;

/// A session as tracked by the index. Planner-local sessions carry negative
/// provisional ids until persistence assigns real ones.
#[derive(Debug, Clone)]
pub struct IndexedSession {
    pub id: SessionId,
    pub course: CourseId,
    pub course_type: CourseType,
    pub family_key: Option<String>,
    pub class_group: ClassGroupId,
    pub subgroup_label: Option<String>,
    pub teacher: TeacherId,
    pub second_teacher: Option<TeacherId>,
    pub room: RoomId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub attendees: Vec<ClassGroupId>,
}

impl IndexedSession {
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.start < end && start < self.end
    }

    pub fn duration_hours(&self) -> u32 {
        ((self.end - self.start).num_minutes().max(0) as u32) / 60
    }

    fn week_start(&self) -> NaiveDate {
        calendar::week_start(self.start.date())
    }
}

/// Opaque snapshot of the mutable index state.
pub struct Checkpoint {
    sessions: BTreeMap<SessionId, IndexedSession>,
    teacher_busy: HashMap<TeacherId, Vec<SessionId>>,
    class_busy: HashMap<ClassGroupId, Vec<SessionId>>,
    room_busy: HashMap<RoomId, Vec<SessionId>>,
    course_teacher_hours: HashMap<(CourseId, TeacherId), u32>,
    next_provisional: i64,
}

#[derive(Debug)]
pub struct AvailabilityIndex {
    /// Structural teacher availability per working day: weekly intervals ∩
    /// daily global window, emptied on date-specific unavailabilities.
    teacher_day: HashMap<(TeacherId, NaiveDate), Vec<(NaiveTime, NaiveTime)>>,
    sessions: BTreeMap<SessionId, IndexedSession>,
    teacher_busy: HashMap<TeacherId, Vec<SessionId>>,
    class_busy: HashMap<ClassGroupId, Vec<SessionId>>,
    room_busy: HashMap<RoomId, Vec<SessionId>>,
    course_teacher_hours: HashMap<(CourseId, TeacherId), u32>,
    next_provisional: i64,
}

impl AvailabilityIndex {
    /// Build the index from the snapshot: precompute structural teacher
    /// availability for every working day of the window and seed occupancy
    /// with every persisted session.
    pub fn build(input: &GenerationInput) -> Self {
        let mut teacher_day = HashMap::new();
        let weeks = calendar::weeks_in(input.window, &input.closings);
        for teacher in input.teachers.values() {
            for week in &weeks {
                for day in calendar::working_days(*week, &input.closings) {
                    if teacher.unavailable.iter().any(|span| span.contains(day)) {
                        continue;
                    }
                    let mut intervals: Vec<(NaiveTime, NaiveTime)> = teacher
                        .weekly_availability
                        .iter()
                        .filter(|interval| interval.weekday == day.weekday())
                        .filter_map(|interval| {
                            let (start, end) = match teacher.daily_window {
                                Some((ws, we)) => (interval.start.max(ws), interval.end.min(we)),
                                None => (interval.start, interval.end),
                            };
                            (start < end).then_some((start, end))
                        })
                        .collect();
                    if intervals.is_empty() {
                        continue;
                    }
                    intervals.sort();
                    teacher_day.insert((teacher.id, day), intervals);
                }
            }
        }

        let mut index = Self {
            teacher_day,
            sessions: BTreeMap::new(),
            teacher_busy: HashMap::new(),
            class_busy: HashMap::new(),
            room_busy: HashMap::new(),
            course_teacher_hours: HashMap::new(),
            next_provisional: -1,
        };
        for session in &input.existing_sessions {
            index.insert(Self::indexed_from(input, session));
        }
        index
    }

    fn indexed_from(input: &GenerationInput, session: &Session) -> IndexedSession {
        let meta = input.course_meta.get(&session.course);
        IndexedSession {
            id: session.id,
            course: session.course,
            course_type: meta.map(|m| m.course_type).unwrap_or(CourseType::CM),
            family_key: meta.and_then(|m| m.family_key.clone()),
            class_group: session.class_group,
            subgroup_label: session.subgroup_label.clone(),
            teacher: session.teacher,
            second_teacher: session.second_teacher,
            room: session.room,
            start: session.start,
            end: session.end,
            attendees: if session.attendees.is_empty() {
                vec![session.class_group]
            } else {
                session.attendees.clone()
            },
        }
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Insert a planner-local session, assigning a provisional id.
    pub fn insert_new(&mut self, mut session: IndexedSession) -> SessionId {
        let id = SessionId::new(self.next_provisional);
        self.next_provisional -= 1;
        session.id = id;
        self.insert(session);
        id
    }

    pub fn insert(&mut self, session: IndexedSession) {
        let id = session.id;
        self.teacher_busy.entry(session.teacher).or_default().push(id);
        if let Some(second) = session.second_teacher {
            self.teacher_busy.entry(second).or_default().push(id);
        }
        self.room_busy.entry(session.room).or_default().push(id);
        for attendee in &session.attendees {
            self.class_busy.entry(*attendee).or_default().push(id);
        }
        *self
            .course_teacher_hours
            .entry((session.course, session.teacher))
            .or_default() += session.duration_hours();
        self.sessions.insert(id, session);
    }

    /// Remove a session from every occupancy map; returns it for re-placement.
    pub fn remove(&mut self, id: SessionId) -> Option<IndexedSession> {
        let session = self.sessions.remove(&id)?;
        if let Some(slots) = self.teacher_busy.get_mut(&session.teacher) {
            slots.retain(|s| *s != id);
        }
        if let Some(second) = session.second_teacher {
            if let Some(slots) = self.teacher_busy.get_mut(&second) {
                slots.retain(|s| *s != id);
            }
        }
        if let Some(slots) = self.room_busy.get_mut(&session.room) {
            slots.retain(|s| *s != id);
        }
        for attendee in &session.attendees {
            if let Some(slots) = self.class_busy.get_mut(attendee) {
                slots.retain(|s| *s != id);
            }
        }
        if let Some(hours) = self
            .course_teacher_hours
            .get_mut(&(session.course, session.teacher))
        {
            *hours = hours.saturating_sub(session.duration_hours());
        }
        Some(session)
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            sessions: self.sessions.clone(),
            teacher_busy: self.teacher_busy.clone(),
            class_busy: self.class_busy.clone(),
            room_busy: self.room_busy.clone(),
            course_teacher_hours: self.course_teacher_hours.clone(),
            next_provisional: self.next_provisional,
        }
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.sessions = checkpoint.sessions;
        self.teacher_busy = checkpoint.teacher_busy;
        self.class_busy = checkpoint.class_busy;
        self.room_busy = checkpoint.room_busy;
        self.course_teacher_hours = checkpoint.course_teacher_hours;
        self.next_provisional = checkpoint.next_provisional;
    }

    // ------------------------------------------------------------------
    // Point queries
    // ------------------------------------------------------------------

    pub fn session(&self, id: SessionId) -> Option<&IndexedSession> {
        self.sessions.get(&id)
    }

    /// Structural teacher availability: some precomputed interval covers
    /// `[start, end]` on `date`.
    pub fn teacher_available(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> bool {
        self.teacher_day
            .get(&(teacher, date))
            .is_some_and(|intervals| intervals.iter().any(|(s, e)| *s <= start && end <= *e))
    }

    /// True when an already-placed session occupies the teacher.
    pub fn teacher_occupied(
        &self,
        teacher: TeacherId,
        start: NaiveDateTime,
        end: NaiveDateTime,
        excluding: &[SessionId],
    ) -> bool {
        self.scan(&self.teacher_busy, teacher, start, end, excluding)
    }

    /// True when an already-placed session occupies the room.
    pub fn room_occupied(
        &self,
        room: RoomId,
        start: NaiveDateTime,
        end: NaiveDateTime,
        excluding: &[SessionId],
    ) -> bool {
        self.scan(&self.room_busy, room, start, end, excluding)
    }

    /// True when the class-group (or the same subgroup half of it) is
    /// occupied. Two sessions of disjoint subgroup halves may share a slot;
    /// a whole-class session conflicts with either half.
    pub fn class_occupied(
        &self,
        class_group: ClassGroupId,
        subgroup_label: Option<&str>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        excluding: &[SessionId],
    ) -> bool {
        let Some(ids) = self.class_busy.get(&class_group) else {
            return false;
        };
        ids.iter()
            .filter(|id| !excluding.contains(id))
            .filter_map(|id| self.sessions.get(id))
            .any(|session| {
                session.overlaps(start, end)
                    && subgroups_conflict(session.subgroup_label.as_deref(), subgroup_label)
            })
    }

    /// Convenience query: structurally available and not occupied.
    pub fn teacher_free(
        &self,
        teacher: TeacherId,
        date: NaiveDate,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> bool {
        self.teacher_available(teacher, date, start.time(), end.time())
            && !self.teacher_occupied(teacher, start, end, &[])
    }

    pub fn room_free(
        &self,
        room: RoomId,
        start: NaiveDateTime,
        end: NaiveDateTime,
        excluding: &[SessionId],
    ) -> bool {
        !self.room_occupied(room, start, end, excluding)
    }

    pub fn class_free(
        &self,
        class_group: ClassGroupId,
        subgroup_label: Option<&str>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> bool {
        !self.class_occupied(class_group, subgroup_label, start, end, &[])
    }

    /// Total placed hours for the teacher within the ISO week of `week_start`.
    pub fn teacher_week_hours(&self, teacher: TeacherId, week_start: NaiveDate) -> u32 {
        let week_end = week_start + Duration::days(7);
        self.teacher_busy
            .get(&teacher)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.sessions.get(id))
                    .filter(|s| s.start.date() >= week_start && s.start.date() < week_end)
                    .map(|s| s.duration_hours())
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Hours already placed for `(course, teacher)`, allocation accounting.
    pub fn course_teacher_hours(&self, course: CourseId, teacher: TeacherId) -> u32 {
        self.course_teacher_hours
            .get(&(course, teacher))
            .copied()
            .unwrap_or(0)
    }

    /// Weekly chronology rule: true when a session of the same course family
    /// and class, of a strictly earlier type, already starts after the
    /// candidate start within the candidate's week.
    pub fn breaks_weekly_chronology(
        &self,
        family_key: &str,
        class_group: ClassGroupId,
        type_rank: u8,
        candidate_start: NaiveDateTime,
    ) -> bool {
        let week = calendar::week_start(candidate_start.date());
        let Some(ids) = self.class_busy.get(&class_group) else {
            return false;
        };
        ids.iter()
            .filter_map(|id| self.sessions.get(id))
            .filter(|s| s.week_start() == week)
            .filter(|s| s.family_key.as_deref() == Some(family_key))
            .any(|s| s.course_type.priority_rank() < type_rank && s.start > candidate_start)
    }

    /// Sessions of the class on `date`, for the one-hour pairing preference.
    pub fn class_sessions_on(
        &self,
        class_group: ClassGroupId,
        date: NaiveDate,
    ) -> Vec<&IndexedSession> {
        self.class_busy
            .get(&class_group)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.sessions.get(id))
                    .filter(|s| s.start.date() == date)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// TD/TP sessions of the class within the week, relocation candidates,
    /// ordered by (start, id).
    pub fn relocatable_sessions(
        &self,
        class_group: ClassGroupId,
        week_start: NaiveDate,
    ) -> Vec<SessionId> {
        let week_end = week_start + Duration::days(7);
        let mut candidates: Vec<&IndexedSession> = self
            .class_busy
            .get(&class_group)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.sessions.get(id))
                    .filter(|s| s.course_type.relocatable())
                    .filter(|s| s.start.date() >= week_start && s.start.date() < week_end)
                    .collect()
            })
            .unwrap_or_default();
        candidates.sort_by_key(|s| (s.start, s.id));
        candidates.into_iter().map(|s| s.id).collect()
    }

    fn scan<K: std::hash::Hash + Eq>(
        &self,
        map: &HashMap<K, Vec<SessionId>>,
        key: K,
        start: NaiveDateTime,
        end: NaiveDateTime,
        excluding: &[SessionId],
    ) -> bool {
        map.get(&key).is_some_and(|ids| {
            ids.iter()
                .filter(|id| !excluding.contains(id))
                .filter_map(|id| self.sessions.get(id))
                .any(|session| session.overlaps(start, end))
        })
    }
}

/// Two occupancies of the same class conflict unless they target disjoint
/// subgroup halves.
fn subgroups_conflict(existing: Option<&str>, candidate: Option<&str>) -> bool {
    match (existing, candidate) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

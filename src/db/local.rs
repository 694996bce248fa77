//! In-memory repository for tests and local serving.
//!
//! State lives behind a `parking_lot::RwLock`; `persist_sessions` is
//! all-or-nothing and enforces the global (room, start) uniqueness
//! constraint the persisted store carries.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::models::{
    AllowedWeek, ClassGroup, ClassGroupId, ClosingPeriod, Course, CourseId, NewScheduleLog,
    NewSession, Room, RoomId, Session, SessionId, Teacher, TeacherId,
};

use super::repository::{
    ErrorContext, GenerationScope, PlanningRepository, RepositoryError, RepositoryResult,
    SessionRepository,
};

#[derive(Default)]
struct LocalState {
    teachers: HashMap<TeacherId, Teacher>,
    class_groups: HashMap<ClassGroupId, ClassGroup>,
    rooms: HashMap<RoomId, Room>,
    courses: HashMap<CourseId, Course>,
    closings: Vec<ClosingPeriod>,
    allowed_weeks: Vec<AllowedWeek>,
    sessions: Vec<Session>,
    schedule_logs: Vec<NewScheduleLog>,
    next_session_id: i64,
}

/// In-memory implementation of the repository traits.
#[derive(Default)]
pub struct LocalRepository {
    state: RwLock<LocalState>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LocalState {
                next_session_id: 1,
                ..Default::default()
            }),
        }
    }

    // ------------------------------------------------------------------
    // Seeding helpers (tests and local serving)
    // ------------------------------------------------------------------

    pub fn add_teacher(&self, teacher: Teacher) {
        self.state.write().teachers.insert(teacher.id, teacher);
    }

    pub fn add_class_group(&self, class_group: ClassGroup) {
        self.state
            .write()
            .class_groups
            .insert(class_group.id, class_group);
    }

    pub fn add_room(&self, room: Room) {
        self.state.write().rooms.insert(room.id, room);
    }

    pub fn add_course(&self, course: Course) {
        self.state.write().courses.insert(course.id, course);
    }

    pub fn add_closing_period(&self, closing: ClosingPeriod) {
        self.state.write().closings.push(closing);
    }

    pub fn add_allowed_week(&self, allowed: AllowedWeek) {
        self.state.write().allowed_weeks.push(allowed);
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state.read().sessions.clone()
    }

    pub fn schedule_logs(&self) -> Vec<NewScheduleLog> {
        self.state.read().schedule_logs.clone()
    }
}

#[async_trait]
impl PlanningRepository for LocalRepository {
    async fn list_courses(&self, scope: &GenerationScope) -> RepositoryResult<Vec<Course>> {
        let state = self.state.read();
        let mut courses: Vec<Course> = match scope {
            GenerationScope::All => state.courses.values().cloned().collect(),
            GenerationScope::Courses(ids) => {
                let mut selected = Vec::with_capacity(ids.len());
                for id in ids {
                    let course = state.courses.get(id).cloned().ok_or_else(|| {
                        RepositoryError::not_found(format!("course {} does not exist", id))
                    })?;
                    selected.push(course);
                }
                selected
            }
        };
        courses.sort_by_key(|c| c.id);
        Ok(courses)
    }

    async fn list_teachers(&self) -> RepositoryResult<Vec<Teacher>> {
        let mut teachers: Vec<Teacher> = self.state.read().teachers.values().cloned().collect();
        teachers.sort_by_key(|t| t.id);
        Ok(teachers)
    }

    async fn list_class_groups(&self) -> RepositoryResult<Vec<ClassGroup>> {
        let mut groups: Vec<ClassGroup> =
            self.state.read().class_groups.values().cloned().collect();
        groups.sort_by_key(|g| g.id);
        Ok(groups)
    }

    async fn list_rooms(&self) -> RepositoryResult<Vec<Room>> {
        let mut rooms: Vec<Room> = self.state.read().rooms.values().cloned().collect();
        rooms.sort_by_key(|r| r.id);
        Ok(rooms)
    }

    async fn list_closing_periods(&self) -> RepositoryResult<Vec<ClosingPeriod>> {
        Ok(self.state.read().closings.clone())
    }

    async fn existing_sessions(&self, course: CourseId) -> RepositoryResult<Vec<Session>> {
        Ok(self
            .state
            .read()
            .sessions
            .iter()
            .filter(|s| s.course == course)
            .cloned()
            .collect())
    }

    async fn allowed_weeks(&self, course: CourseId) -> RepositoryResult<Vec<AllowedWeek>> {
        let mut weeks: Vec<AllowedWeek> = self
            .state
            .read()
            .allowed_weeks
            .iter()
            .filter(|w| w.course == course)
            .cloned()
            .collect();
        weeks.sort_by_key(|w| w.week_start);
        Ok(weeks)
    }
}

#[async_trait]
impl SessionRepository for LocalRepository {
    async fn persist_sessions(&self, sessions: &[NewSession]) -> RepositoryResult<Vec<Session>> {
        let mut state = self.state.write();

        // Uniqueness check over existing and incoming rows before any write.
        for (idx, new) in sessions.iter().enumerate() {
            let clash_existing = state
                .sessions
                .iter()
                .any(|s| s.room == new.room && s.start == new.start);
            let clash_batch = sessions[..idx]
                .iter()
                .any(|s| s.room == new.room && s.start == new.start);
            if clash_existing || clash_batch {
                return Err(RepositoryError::conflict(
                    format!("room {} already booked at {}", new.room, new.start),
                    ErrorContext::new("persist_sessions")
                        .with_entity("session")
                        .with_details("unique (room_id, start_time) violated"),
                ));
            }
        }

        let mut persisted = Vec::with_capacity(sessions.len());
        for new in sessions {
            let id = SessionId::new(state.next_session_id);
            state.next_session_id += 1;
            let session = Session {
                id,
                course: new.course,
                class_group: new.class_group,
                subgroup_label: new.subgroup_label.clone(),
                teacher: new.teacher,
                second_teacher: new.second_teacher,
                room: new.room,
                start: new.start,
                end: new.end,
                attendees: if new.attendees.is_empty() {
                    vec![new.class_group]
                } else {
                    new.attendees.clone()
                },
            };
            state.sessions.push(session.clone());
            persisted.push(session);
        }
        Ok(persisted)
    }

    async fn persist_schedule_log(&self, log: &NewScheduleLog) -> RepositoryResult<()> {
        self.state.write().schedule_logs.push(log.clone());
        Ok(())
    }
}

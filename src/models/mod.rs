//! Domain model: typed identifiers, snapshot entities, and the calendar.

pub mod calendar;
pub mod entities;
pub mod ids;

pub use entities::{
    AllowedWeek, ClassGroup, ClosingPeriod, Course, CourseClassLink, CourseType, DateSpan,
    NewScheduleLog, NewSession, Room, ScheduleLogStatus, Session, Teacher, TeacherHourAllocation,
    WeeklyInterval,
};
pub use ids::{ClassGroupId, CourseId, RoomId, SessionId, TeacherId};

//! Repository traits and error types.
//!
//! The contracts are abstract (no SQL leaks through them); errors carry a
//! structured [`ErrorContext`] so callers can log where and why an operation
//! failed.

use std::fmt;

use async_trait::async_trait;

use crate::models::{
    AllowedWeek, ClassGroup, ClosingPeriod, Course, CourseId, NewScheduleLog, NewSession, Room,
    Session, Teacher,
};

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Which courses a generation plans over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationScope {
    All,
    Courses(Vec<CourseId>),
}

/// Structured context for repository errors.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation being performed (e.g. "persist_sessions").
    pub operation: Option<String>,
    /// The entity type involved (e.g. "session").
    pub entity: Option<String>,
    /// The entity id if applicable.
    pub entity_id: Option<String>,
    /// Additional details about the error.
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref op) = self.operation {
            parts.push(format!("operation={}", op));
        }
        if let Some(ref entity) = self.entity {
            parts.push(format!("entity={}", entity));
        }
        if let Some(ref id) = self.entity_id {
            parts.push(format!("id={}", id));
        }
        if let Some(ref details) = self.details {
            parts.push(format!("details={}", details));
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Requested entity was not found.
    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// A uniqueness or integrity constraint was violated.
    #[error("Conflict: {message} {context}")]
    Conflict {
        message: String,
        context: ErrorContext,
    },

    /// Data validation failed before or after the storage operation.
    #[error("Data validation error: {message} {context}")]
    ValidationError {
        message: String,
        context: ErrorContext,
    },

    /// Internal/unexpected errors.
    #[error("Internal error: {message} {context}")]
    InternalError {
        message: String,
        context: ErrorContext,
    },
}

impl RepositoryError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn conflict(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Conflict {
            message: message.into(),
            context,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn internal(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InternalError {
            message: message.into(),
            context,
        }
    }
}

/// Read contracts the planner loads its snapshot through.
#[async_trait]
pub trait PlanningRepository: Send + Sync {
    /// Courses in scope, with their class links, teachers, and resource
    /// requirements resolved.
    async fn list_courses(&self, scope: &GenerationScope) -> RepositoryResult<Vec<Course>>;

    async fn list_teachers(&self) -> RepositoryResult<Vec<Teacher>>;

    async fn list_class_groups(&self) -> RepositoryResult<Vec<ClassGroup>>;

    async fn list_rooms(&self) -> RepositoryResult<Vec<Room>>;

    async fn list_closing_periods(&self) -> RepositoryResult<Vec<ClosingPeriod>>;

    async fn existing_sessions(&self, course: CourseId) -> RepositoryResult<Vec<Session>>;

    async fn allowed_weeks(&self, course: CourseId) -> RepositoryResult<Vec<AllowedWeek>>;
}

/// Write contracts for generation outputs.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Persist every session of a run in one transaction. Attendance is
    /// registered for every attending class-group. The store enforces
    /// (room, start) uniqueness; a violation fails the whole batch.
    async fn persist_sessions(&self, sessions: &[NewSession]) -> RepositoryResult<Vec<Session>>;

    /// Append a generation log entry for a course.
    async fn persist_schedule_log(&self, log: &NewScheduleLog) -> RepositoryResult<()>;
}

/// Convenience super-trait for components needing both sides.
pub trait FullRepository: PlanningRepository + SessionRepository {}

impl<T: PlanningRepository + SessionRepository> FullRepository for T {}

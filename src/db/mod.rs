//! Persistence seam.
//!
//! The core reads a snapshot through [`repository::PlanningRepository`] at
//! job start and writes the resulting sessions through
//! [`repository::SessionRepository`] in a single call at job end. The only
//! shipped backend is the in-memory [`local::LocalRepository`]; a SQL
//! backend slots behind the same traits.

pub mod local;
pub mod repository;

pub use local::LocalRepository;
pub use repository::{
    ErrorContext, FullRepository, GenerationScope, PlanningRepository, RepositoryError,
    RepositoryResult, SessionRepository,
};

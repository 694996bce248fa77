//! Application state for the HTTP server.

use std::sync::Arc;

use crate::db::repository::FullRepository;
use crate::services::jobs::JobRunner;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Repository instance for data access.
    pub repository: Arc<dyn FullRepository>,
    /// In-memory job runner for background generations.
    pub jobs: JobRunner,
}

impl AppState {
    pub fn new(repository: Arc<dyn FullRepository>) -> Self {
        Self {
            repository,
            jobs: JobRunner::new(),
        }
    }
}

//! HTTP server module.
//!
//! Axum-based REST surface for the generation job runner: submit a
//! generation, poll its progress snapshot, fetch its result.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;

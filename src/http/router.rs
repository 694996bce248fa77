//! Router configuration for the HTTP API.
//!
//! Sets up the routes and middleware (CORS, compression, tracing) and
//! returns the axum router ready for serving.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Permissive CORS for development; restrict in production.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/generate", post(handlers::submit_generation))
        .route("/generate/{job_id}/status", get(handlers::job_status))
        .route("/generate/{job_id}/result", get(handlers::job_result))
        .route("/generate/{job_id}/cancel", post(handlers::cancel_job))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

//! API route configuration.

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Operator view of the shared cache
        .route("/content/cache", get(handlers::cache_stats))
        // Content variants
        .route("/content/:variant", get(handlers::get_content))
        .with_state(state)
}

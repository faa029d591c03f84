//! Route definitions for the `/pipeline` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::pipeline;
use crate::state::AppState;

/// Request/response routes mounted at `/pipeline`.
///
/// ```text
/// GET    /progress/{project_id}  -> get_progress
/// GET    /status                 -> pipeline_status
/// POST   /complete               -> mark_complete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/progress/{project_id}", get(pipeline::get_progress))
        .route("/status", get(pipeline::pipeline_status))
        .route("/complete", post(pipeline::mark_complete))
}

/// Routes mounted at `/pipeline` that may hold the request until the
/// conversion executable exits (`?wait=true`).
///
/// ```text
/// POST   /start                  -> start_pipeline
/// ```
pub fn start_router() -> Router<AppState> {
    Router::new().route("/start", post(pipeline::start_pipeline))
}

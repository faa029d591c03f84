pub mod health;
pub mod pipeline;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree served under the regular request timeout.
///
/// ```text
/// /pipeline/progress/{project_id}     poll a live job (auth required)
/// /pipeline/status                    completion ledger lookup (public)
/// /pipeline/complete                  mark ledger entry complete (public)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/pipeline", pipeline::router())
}

/// Build the `/api` routes whose requests may outlive the regular request
/// timeout.
///
/// ```text
/// /pipeline/start                     start a conversion job (auth required)
/// ```
pub fn long_running_routes() -> Router<AppState> {
    Router::new().nest("/pipeline", pipeline::start_router())
}

//! Handlers for the `/pipeline` resource.
//!
//! `start` and `progress` require a bearer token via [`AuthUser`]. The
//! completion ledger endpoints (`status`, `complete`) are public because the
//! conversion executable and the plan viewer call them without a session.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hvac_core::error::CoreError;
use hvac_core::pipeline::ledger_key::completion_key;
use hvac_core::pipeline::state::JobState;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::pipeline::LaunchRequest;
use crate::state::AppState;

const MISSING_START_FIELDS: &str = "Missing required fields.";
const MISSING_LEDGER_FIELDS: &str = "Missing UUID or Plan ID";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /pipeline/start`.
#[derive(Debug, Deserialize)]
pub struct StartPipelineRequest {
    /// Registry key. Derived from `uuid` and `plan_id` when absent.
    #[serde(default, rename = "projectId")]
    pub project_id: Option<String>,
    #[serde(default, alias = "planId")]
    pub plan_id: Option<String>,
    /// Falls back to the token's `uuid` claim.
    #[serde(default)]
    pub uuid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartPipelineQuery {
    /// Block until the executable exits.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
pub struct StartedResponse {
    pub message: &'static str,
    #[serde(rename = "projectId")]
    pub project_id: String,
}

#[derive(Debug, Serialize)]
pub struct FinishedResponse {
    pub message: &'static str,
    pub plan_id: String,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: u8,
    pub state: &'static str,
}

/// Query of `GET /pipeline/status` and body of `POST /pipeline/complete`.
#[derive(Debug, Deserialize)]
pub struct LedgerParams {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, alias = "planId")]
    pub plan_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keep only values with non-whitespace content.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn ledger_params(params: LedgerParams) -> AppResult<(String, String)> {
    match (present(params.uuid), present(params.plan_id)) {
        (Some(uuid), Some(plan_id)) => Ok((uuid, plan_id)),
        _ => Err(AppError::Core(CoreError::Validation(
            MISSING_LEDGER_FIELDS.into(),
        ))),
    }
}

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// POST /api/pipeline/start
///
/// Accepts the job and returns 202 immediately. With `?wait=true` the
/// request is held until the executable exits and answers 200 on success or
/// a generic 500 on failure.
pub async fn start_pipeline(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<StartPipelineQuery>,
    Json(input): Json<StartPipelineRequest>,
) -> AppResult<Response> {
    let uuid = present(input.uuid).or_else(|| present(auth.uuid.clone()));
    let (Some(uuid), Some(plan_id)) = (uuid, present(input.plan_id)) else {
        return Err(AppError::Core(CoreError::Validation(
            MISSING_START_FIELDS.into(),
        )));
    };
    let job_key = present(input.project_id).unwrap_or_else(|| completion_key(&uuid, &plan_id));

    tracing::info!(
        user_id = %auth.user_id,
        project_id = %job_key,
        plan_id = %plan_id,
        uuid = %uuid,
        wait = query.wait,
        "Pipeline start requested",
    );

    let accepted = state
        .jobs
        .submit(LaunchRequest {
            job_key,
            uuid,
            plan_id: plan_id.clone(),
        })
        .await?;

    if !query.wait {
        return Ok((
            StatusCode::ACCEPTED,
            Json(StartedResponse {
                message: "Pipeline started",
                project_id: accepted.job_key,
            }),
        )
            .into_response());
    }

    let final_state = accepted.completion.await.map_err(|_| {
        AppError::InternalError(format!(
            "supervisor for project {} ended without reporting",
            accepted.job_key
        ))
    })?;

    match final_state {
        JobState::Completed => Ok(Json(FinishedResponse {
            message: "Pipeline completed successfully",
            plan_id,
            status: "success",
        })
        .into_response()),
        JobState::Failed(reason) => Err(AppError::Core(CoreError::Execution(format!(
            "pipeline for project {} {reason}",
            accepted.job_key
        )))),
        JobState::Queued | JobState::Running => Err(AppError::InternalError(format!(
            "pipeline for project {} reported a non-terminal state",
            accepted.job_key
        ))),
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /api/pipeline/progress/{project_id}
///
/// 404 once the job has exited, whatever its outcome.
pub async fn get_progress(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<Json<ProgressResponse>> {
    let snapshot = state.jobs.get_progress(&project_id).await?;
    Ok(Json(ProgressResponse {
        progress: snapshot.progress,
        state: snapshot.state.as_str(),
    }))
}

// ---------------------------------------------------------------------------
// Completion ledger
// ---------------------------------------------------------------------------

/// GET /api/pipeline/status?uuid=&plan_id=
pub async fn pipeline_status(
    State(state): State<AppState>,
    Query(params): Query<LedgerParams>,
) -> AppResult<Json<StatusResponse>> {
    let (uuid, plan_id) = ledger_params(params)?;
    let status = state.ledger.check_status(&uuid, &plan_id).await;
    tracing::debug!(uuid = %uuid, plan_id = %plan_id, status = status.as_str(), "Checked pipeline status");

    Ok(Json(StatusResponse {
        status: status.as_str(),
        message: status.message(),
    }))
}

/// POST /api/pipeline/complete
pub async fn mark_complete(
    State(state): State<AppState>,
    Json(params): Json<LedgerParams>,
) -> AppResult<Json<MessageResponse>> {
    let (uuid, plan_id) = ledger_params(params)?;
    state.ledger.mark_complete(&uuid, &plan_id).await;

    Ok(Json(MessageResponse {
        message: "Pipeline marked as completed",
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Run API handlers: live status, stop, human input, stored results.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tatkal_core::input::InputRequest;
use tatkal_core::{validate_input, BookingResult, BotStatus, InputKind};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for result queries
const MAX_LIMIT: usize = 500;

/// Default limit for result queries
const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<BotStatus>,
}

/// A live run, or the stored result of a finished one.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BotStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_input: Option<InputRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<BookingResult>,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

#[derive(Debug, Deserialize)]
pub struct InputBody {
    pub kind: InputKind,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct InputResponse {
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct ListResultsParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ListResultsResponse {
    pub results: Vec<BookingResult>,
}

pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<ListRunsResponse> {
    Json(ListRunsResponse {
        runs: state.registry().statuses().await,
    })
}

pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunResponse>, ApiError> {
    if let Some(bot) = state.registry().get(&id).await {
        return Ok(Json(RunResponse {
            run_id: id,
            status: Some(bot.get_status()),
            pending_input: bot.outstanding_input(),
            result: None,
        }));
    }

    match state.results().get(&id) {
        Ok(Some(result)) => Ok(Json(RunResponse {
            run_id: id,
            status: None,
            pending_input: None,
            result: Some(result),
        })),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Run not found: {}", id),
        )),
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

pub async fn stop_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    if state.registry().stop(&id).await {
        Ok(Json(StopResponse { stopped: true }))
    } else {
        Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No active run {}", id),
        ))
    }
}

/// Answer a run's captcha or OTP prompt
pub async fn submit_input(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<InputBody>,
) -> Result<Json<InputResponse>, ApiError> {
    if !validate_input(body.kind, &body.value) {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Invalid {} format", body.kind),
        ));
    }

    match state
        .registry()
        .submit_input(&id, body.kind, body.value.trim())
        .await
    {
        Some(true) => Ok(Json(InputResponse { accepted: true })),
        Some(false) => Err(api_error(
            StatusCode::CONFLICT,
            format!("Run {} is not waiting for {} input", id, body.kind),
        )),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No active run {}", id),
        )),
    }
}

/// Most recent stored results, newest first
pub async fn list_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListResultsParams>,
) -> Result<Json<ListResultsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    state
        .results()
        .recent(limit)
        .map(|results| Json(ListResultsResponse { results }))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

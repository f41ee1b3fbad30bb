//! Booking API handlers: validation, scheduling, queueing, immediate start.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use tatkal_core::queue::QueueItemStatus;
use tatkal_core::scheduler::{ScheduledJob, ScheduledJobSummary, SchedulerError};
use tatkal_core::{new_run_id, validate_booking, BookingConfig, QueueStatus};

use super::handlers::{api_error, validation_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Request body for scheduling a booking
#[derive(Debug, Deserialize)]
pub struct ScheduleBody {
    pub booking: BookingConfig,
    /// Fire instant. Defaults to the reservation opening for the journey.
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub job_id: String,
    pub fire_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ScheduledListResponse {
    pub jobs: Vec<ScheduledJobSummary>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Request body for queueing a booking
#[derive(Debug, Deserialize)]
pub struct QueueBody {
    pub booking: BookingConfig,
    /// Higher runs sooner
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub item_id: String,
    pub status: QueueItemStatus,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub run_id: String,
}

fn check(state: &AppState, booking: &BookingConfig) -> Result<(), ApiError> {
    validate_booking(booking, state.site_today()).map_err(|e| validation_error(e.errors))
}

// ============================================================================
// Handlers
// ============================================================================

/// Validate a booking without acting on it
pub async fn validate(
    State(state): State<Arc<AppState>>,
    Json(booking): Json<BookingConfig>,
) -> Json<ValidateResponse> {
    let errors = match validate_booking(&booking, state.site_today()) {
        Ok(()) => Vec::new(),
        Err(e) => e.errors,
    };
    Json(ValidateResponse {
        valid: errors.is_empty(),
        errors,
    })
}

/// Schedule a booking at an explicit instant or at the reservation opening
pub async fn schedule(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScheduleBody>,
) -> Result<(StatusCode, Json<ScheduleResponse>), ApiError> {
    check(&state, &body.booking)?;

    let scheduler = state.scheduler();
    let job_id = match body.at {
        Some(at) => scheduler.schedule(body.booking, at).await,
        None => scheduler
            .schedule_at_opening(body.booking)
            .await
            .map_err(|e| api_error(StatusCode::CONFLICT, e.to_string()))?,
    };

    let job = scheduler
        .get(&job_id)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(ScheduleResponse {
            job_id,
            fire_at: job.fire_at,
            drift_ms: job.drift_ms,
        }),
    ))
}

pub async fn list_scheduled(State(state): State<Arc<AppState>>) -> Json<ScheduledListResponse> {
    Json(ScheduledListResponse {
        jobs: state.scheduler().get_scheduled(),
    })
}

pub async fn get_scheduled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ScheduledJob>, ApiError> {
    state
        .scheduler()
        .get(&id)
        .map(Json)
        .map_err(|e| api_error(StatusCode::NOT_FOUND, e.to_string()))
}

/// Cancel a job that has not fired yet
pub async fn cancel_scheduled(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let scheduler = state.scheduler();
    if scheduler.cancel(&id) {
        return Ok(Json(CancelResponse { cancelled: true }));
    }

    match scheduler.get(&id) {
        Ok(job) => Err(api_error(
            StatusCode::CONFLICT,
            format!("Job {} is already {}", id, job.status.as_str()),
        )),
        Err(e @ SchedulerError::JobNotFound(_)) => {
            Err(api_error(StatusCode::NOT_FOUND, e.to_string()))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

/// Add a booking to the queue and start it if a slot is free
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QueueBody>,
) -> Result<(StatusCode, Json<QueueResponse>), ApiError> {
    check(&state, &body.booking)?;

    let queue = state.queue();
    let item_id = queue.enqueue(body.booking, body.priority);
    queue.drain();

    let status = queue
        .get(&item_id)
        .map(|item| item.status)
        .unwrap_or(QueueItemStatus::Queued);

    Ok((StatusCode::CREATED, Json(QueueResponse { item_id, status })))
}

pub async fn queue_status(State(state): State<Arc<AppState>>) -> Json<QueueStatus> {
    Json(state.queue().status())
}

/// Start a booking right away on its own task
pub async fn start(
    State(state): State<Arc<AppState>>,
    Json(booking): Json<BookingConfig>,
) -> Result<(StatusCode, Json<StartResponse>), ApiError> {
    check(&state, &booking)?;

    let run_id = new_run_id();
    let runner = state.runner();
    info!("Starting ad-hoc run {}", run_id);

    tokio::spawn({
        let run_id = run_id.clone();
        async move {
            match runner.run(&run_id, booking).await {
                Ok(result) => info!("Run {} ended as {}", run_id, result.status.as_str()),
                Err(e) => error!("Run {} could not run: {}", run_id, e),
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(StartResponse { run_id })))
}

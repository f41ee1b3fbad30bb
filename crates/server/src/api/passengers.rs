//! Saved passenger list, reused across bookings.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use tatkal_core::{validate_passengers, Passenger, SavedPassengers};

use super::handlers::{api_error, invalid, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SavePassengersBody {
    pub passengers: Vec<Passenger>,
}

#[derive(Debug, Serialize)]
pub struct PassengersResponse {
    pub passengers: Vec<Passenger>,
    /// Absent until a list has been saved.
    pub saved_at: Option<DateTime<Utc>>,
}

impl From<Option<SavedPassengers>> for PassengersResponse {
    fn from(saved: Option<SavedPassengers>) -> Self {
        match saved {
            Some(saved) => Self {
                passengers: saved.passengers,
                saved_at: Some(saved.saved_at),
            },
            None => Self {
                passengers: Vec::new(),
                saved_at: None,
            },
        }
    }
}

/// Replace the saved passenger list
pub async fn save_passengers(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SavePassengersBody>,
) -> Result<Json<PassengersResponse>, ApiError> {
    validate_passengers(&body.passengers)
        .map_err(|e| invalid("Invalid passenger data", e.errors))?;

    let saved = state.passengers().save_passengers(&body.passengers).map_err(|e| {
        error!("Failed to save passengers: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    info!("Saved {} passenger(s)", saved.passengers.len());
    Ok(Json(PassengersResponse::from(Some(saved))))
}

/// The saved passenger list, empty when none was saved
pub async fn load_passengers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PassengersResponse>, ApiError> {
    let saved = state.passengers().load_passengers().map_err(|e| {
        error!("Failed to load passengers: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(PassengersResponse::from(saved)))
}

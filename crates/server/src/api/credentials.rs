//! Sealing login pairs so bookings can carry them instead of a profile name.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use tatkal_core::{validate_credentials, Credentials};

use super::handlers::{api_error, invalid, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SealBody {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SealResponse {
    /// Value for a booking's `credentials` field.
    pub credentials: String,
}

/// Encrypt a login pair with the server's key
pub async fn seal(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SealBody>,
) -> Result<Json<SealResponse>, ApiError> {
    let Some(sealer) = state.sealer() else {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "Credential encryption is not configured",
        ));
    };

    let credentials = Credentials {
        username: body.username.trim().to_string(),
        password: body.password,
    };
    validate_credentials(&credentials).map_err(|e| invalid("Invalid credentials", e.errors))?;

    let sealed = sealer.seal(&credentials).map_err(|e| {
        error!("Failed to seal credentials: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(SealResponse { credentials: sealed }))
}

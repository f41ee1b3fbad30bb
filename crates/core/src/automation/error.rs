//! Error types for the automation surface.

use thiserror::Error;

/// Errors raised by a browser session.
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// The element or page condition did not appear in time.
    #[error("Timed out after {timeout_ms}ms waiting for {target}")]
    Timeout { target: String, timeout_ms: u64 },

    /// No element matched the selector.
    #[error("Element not found: {selector}")]
    NotFound { selector: String },

    /// The browser could not be started.
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    /// The automation backend returned an error or garbage.
    #[error("Automation protocol error: {0}")]
    Protocol(String),

    /// HTTP transport failure talking to the backend.
    #[error("Automation transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SurfaceError {
    pub fn timeout(target: impl Into<String>, timeout_ms: u64) -> Self {
        SurfaceError::Timeout {
            target: target.into(),
            timeout_ms,
        }
    }

    pub fn not_found(selector: impl Into<String>) -> Self {
        SurfaceError::NotFound {
            selector: selector.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SurfaceError::Timeout { .. })
    }
}

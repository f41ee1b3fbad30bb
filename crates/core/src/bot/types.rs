use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BookingFlowConfig;
use crate::credentials::CredentialError;
use crate::input::InputKind;

/// Position of a run in the booking flow.
///
/// The flow is a single forward path. `WaitingCaptcha` and `WaitingOtp` are
/// suspensions nested inside login and passenger details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStep {
    Idle,
    BrowserInit,
    Login,
    WaitingCaptcha,
    WaitingOtp,
    TrainSearch,
    TrainSelection,
    PassengerDetails,
    Payment,
    Confirmation,
    Success,
    Failed,
    Unknown,
    Stopped,
}

impl BotStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStep::Idle => "idle",
            BotStep::BrowserInit => "browser_init",
            BotStep::Login => "login",
            BotStep::WaitingCaptcha => "waiting_captcha",
            BotStep::WaitingOtp => "waiting_otp",
            BotStep::TrainSearch => "train_search",
            BotStep::TrainSelection => "train_selection",
            BotStep::PassengerDetails => "passenger_details",
            BotStep::Payment => "payment",
            BotStep::Confirmation => "confirmation",
            BotStep::Success => "success",
            BotStep::Failed => "failed",
            BotStep::Unknown => "unknown",
            BotStep::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BotStep::Success | BotStep::Failed | BotStep::Unknown | BotStep::Stopped
        )
    }

    /// Message published when the run enters this step.
    pub(crate) fn banner(&self) -> &'static str {
        match self {
            BotStep::Idle => "Waiting to start",
            BotStep::BrowserInit => "Initializing browser",
            BotStep::Login => "Logging in",
            BotStep::WaitingCaptcha => "Captcha detected, please solve it",
            BotStep::WaitingOtp => "OTP required, please enter it",
            BotStep::TrainSearch => "Searching for trains",
            BotStep::TrainSelection => "Selecting train",
            BotStep::PassengerDetails => "Filling passenger details",
            BotStep::Payment => "Processing payment",
            BotStep::Confirmation => "Confirming booking",
            BotStep::Success => "Booking successful",
            BotStep::Failed => "Booking failed",
            BotStep::Unknown => "Booking status unknown",
            BotStep::Stopped => "Booking stopped",
        }
    }
}

impl fmt::Display for BotStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a run, readable at any time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotStatus {
    pub run_id: String,
    pub step: BotStep,
    pub running: bool,
    pub waiting_for_input: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_input: Option<InputKind>,
    pub updated_at: DateTime<Utc>,
}

impl BotStatus {
    pub(crate) fn idle(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            step: BotStep::Idle,
            running: false,
            waiting_for_input: false,
            pending_input: None,
            updated_at: Utc::now(),
        }
    }
}

/// Why a run ended without a result from the confirmation page.
#[derive(Debug, Error)]
pub enum BotError {
    /// An interaction with the page failed or timed out.
    #[error("{step} failed: {message}")]
    Step { step: BotStep, message: String },

    #[error("Timed out after {waited_secs}s waiting for {kind} input")]
    InputTimeout { kind: InputKind, waited_secs: u64 },

    #[error("Booking stopped by user")]
    Stopped,

    #[error("Credentials unavailable: {0}")]
    Credentials(#[from] CredentialError),

    #[error("Failed to start browser: {0}")]
    Surface(String),

    /// The run panicked.
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Run has already been started")]
    AlreadyStarted,
}

impl BotError {
    pub fn step(step: BotStep, message: impl Into<String>) -> Self {
        BotError::Step {
            step,
            message: message.into(),
        }
    }
}

/// Target site and time budgets of a run.
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub base_url: String,
    pub search_path: String,
    pub page_timeout: Duration,
    pub input_timeout: Duration,
    pub payment_timeout: Duration,
    pub confirmation_timeout: Duration,
    /// Budget for form controls that should already be on the page.
    pub element_timeout: Duration,
    /// How long to look for an optional OTP prompt.
    pub otp_detect_timeout: Duration,
    /// How long to look for an optional captcha on the passenger page.
    pub captcha_detect_timeout: Duration,
}

impl BotSettings {
    pub fn search_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.search_path
        )
    }
}

impl From<&BookingFlowConfig> for BotSettings {
    fn from(config: &BookingFlowConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            search_path: config.search_path.clone(),
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            input_timeout: Duration::from_secs(config.input_timeout_secs),
            payment_timeout: Duration::from_secs(config.payment_timeout_secs),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            element_timeout: Duration::from_secs(10),
            otp_detect_timeout: Duration::from_secs(5),
            captcha_detect_timeout: Duration::from_secs(2),
        }
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self::from(&BookingFlowConfig::default())
    }
}

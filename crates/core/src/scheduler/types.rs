use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::booking::{BookingConfig, BookingResult, BookingStatus, JourneySummary};

/// Lifecycle of a scheduled job. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
    Error,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Scheduled => "scheduled",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Error | JobStatus::Cancelled
        )
    }

    /// Terminal status for a run that produced a result.
    pub fn from_result(result: &BookingResult) -> Self {
        match result.status {
            BookingStatus::Success => JobStatus::Completed,
            BookingStatus::Failed | BookingStatus::Unknown => JobStatus::Failed,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Scheduled => 0,
            JobStatus::Running => 1,
            _ => 2,
        }
    }
}

/// A booking waiting for, or past, its fire instant.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    pub id: String,
    pub config: BookingConfig,
    /// Instant the caller asked for.
    pub requested_at: DateTime<Utc>,
    /// Instant the timer fires at, after drift correction.
    pub fire_at: DateTime<Utc>,
    /// Last measured remote minus local drift, when a measurement succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift_ms: Option<i64>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<BookingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScheduledJob {
    /// Move to `next` if that is forward progress. Returns whether it moved.
    pub(crate) fn advance(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() || next.rank() <= self.status.rank() {
            return false;
        }
        self.status = next;
        let now = Utc::now();
        if next == JobStatus::Running {
            self.started_at = Some(now);
        } else if next.is_terminal() {
            self.finished_at = Some(now);
        }
        true
    }

    pub fn summary(&self) -> ScheduledJobSummary {
        ScheduledJobSummary {
            id: self.id.clone(),
            fire_at: self.fire_at,
            status: self.status,
            journey: self.config.journey_summary(),
        }
    }
}

/// Listing entry for scheduled jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledJobSummary {
    pub id: String,
    pub fire_at: DateTime<Utc>,
    pub status: JobStatus,
    pub journey: JourneySummary,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Booking window already opened at {opening}")]
    OpeningPassed { opening: DateTime<Utc> },

    #[error("Scheduled job not found: {0}")]
    JobNotFound(String),
}

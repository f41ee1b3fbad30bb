use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{BookingConfig, BookingResult, BookingStatus, JourneySummary};

/// Lifecycle of a queued booking. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Error,
}

impl QueueItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueItemStatus::Queued => "queued",
            QueueItemStatus::Running => "running",
            QueueItemStatus::Completed => "completed",
            QueueItemStatus::Failed => "failed",
            QueueItemStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueItemStatus::Completed | QueueItemStatus::Failed | QueueItemStatus::Error
        )
    }

    pub fn from_result(result: &BookingResult) -> Self {
        match result.status {
            BookingStatus::Success => QueueItemStatus::Completed,
            BookingStatus::Failed | BookingStatus::Unknown => QueueItemStatus::Failed,
        }
    }
}

/// A booking waiting for, holding, or done with a run slot.
#[derive(Debug, Clone, Serialize)]
pub struct QueueItem {
    pub id: String,
    pub config: BookingConfig,
    /// Higher runs sooner.
    pub priority: i32,
    pub enqueued_at: DateTime<Utc>,
    pub status: QueueItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<BookingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueItem {
    pub(crate) fn new(id: String, config: BookingConfig, priority: i32) -> Self {
        Self {
            id,
            config,
            priority,
            enqueued_at: Utc::now(),
            status: QueueItemStatus::Queued,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        }
    }

    pub fn summary(&self) -> QueueItemSummary {
        QueueItemSummary {
            id: self.id.clone(),
            priority: self.priority,
            status: self.status,
            enqueued_at: self.enqueued_at,
            started_at: self.started_at,
            journey: self.config.journey_summary(),
        }
    }
}

/// Listing entry for queued and running items.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueItemSummary {
    pub id: String,
    pub priority: i32,
    pub status: QueueItemStatus,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub journey: JourneySummary,
}

/// Read-only snapshot of the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: usize,
    /// Waiting items in admission order, then running items.
    pub items: Vec<QueueItemSummary>,
}

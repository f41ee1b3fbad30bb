use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::BookingResult;
use crate::bot::BotStep;
use crate::input::InputKind;
use crate::queue::QueueItemStatus;
use crate::scheduler::JobStatus;

/// Severity attached to a human-readable status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Events published by runs, the scheduler, and the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingEvent {
    // Run lifecycle
    Status {
        run_id: String,
        step: BotStep,
        message: String,
        severity: Severity,
    },
    InputRequested {
        run_id: String,
        kind: InputKind,
        /// Base64 PNG of the captcha, when there is one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    InputAccepted {
        run_id: String,
        kind: InputKind,
    },
    Finished {
        result: BookingResult,
    },

    // Scheduler
    JobScheduled {
        job_id: String,
        fire_at: DateTime<Utc>,
    },
    JobUpdated {
        job_id: String,
        status: JobStatus,
    },

    // Queue
    QueueUpdated {
        item_id: String,
        status: QueueItemStatus,
    },
}

impl BookingEvent {
    /// Short event name, used for metrics labels and logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::Status { .. } => "status",
            BookingEvent::InputRequested { .. } => "input_requested",
            BookingEvent::InputAccepted { .. } => "input_accepted",
            BookingEvent::Finished { .. } => "finished",
            BookingEvent::JobScheduled { .. } => "job_scheduled",
            BookingEvent::JobUpdated { .. } => "job_updated",
            BookingEvent::QueueUpdated { .. } => "queue_updated",
        }
    }

    /// Run this event belongs to, if any.
    pub fn run_id(&self) -> Option<&str> {
        match self {
            BookingEvent::Status { run_id, .. }
            | BookingEvent::InputRequested { run_id, .. }
            | BookingEvent::InputAccepted { run_id, .. } => Some(run_id),
            BookingEvent::Finished { result } => Some(&result.run_id),
            _ => None,
        }
    }
}

//! Hand-off point between a running booking and the person answering its prompts.
//!
//! A run arms at most one request at a time and waits on it with a deadline.
//! Answers arriving while nothing matching is armed are dropped, never queued.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::events::{BookingEvent, EventHandle};
use crate::metrics::INPUT_REQUESTS;

/// What the run is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Captcha,
    Otp,
}

impl InputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Captcha => "captcha",
            InputKind::Otp => "otp",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The currently outstanding request, as seen from outside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputRequest {
    pub kind: InputKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Value(String),
    TimedOut,
    Cancelled,
}

struct Armed {
    id: u64,
    request: InputRequest,
    tx: oneshot::Sender<String>,
}

/// Single-slot request/response channel owned by one run.
pub struct InputChannel {
    run_id: String,
    events: EventHandle,
    slot: Mutex<Option<Armed>>,
    next_id: AtomicU64,
}

impl InputChannel {
    pub fn new(run_id: impl Into<String>, events: EventHandle) -> Self {
        Self {
            run_id: run_id.into(),
            events,
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Armed>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm a request and publish it.
    ///
    /// Replaces any previous request; its waiter observes a cancellation.
    pub fn request(&self, kind: InputKind, payload: Option<String>) -> PendingInput<'_> {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = InputRequest { kind, payload };

        *self.slot() = Some(Armed {
            id,
            request: request.clone(),
            tx,
        });

        INPUT_REQUESTS.with_label_values(&[kind.as_str()]).inc();
        self.events.emit(BookingEvent::InputRequested {
            run_id: self.run_id.clone(),
            kind,
            payload: request.payload,
        });

        PendingInput {
            channel: self,
            id,
            kind,
            rx,
        }
    }

    /// Deliver an answer. Returns false when no request of `kind` is armed.
    pub fn respond(&self, kind: InputKind, value: impl Into<String>) -> bool {
        let mut slot = self.slot();
        match slot.take() {
            Some(armed) if armed.request.kind == kind => armed.tx.send(value.into()).is_ok(),
            other => {
                *slot = other;
                debug!(
                    "Dropping unexpected {} input for run {}",
                    kind, self.run_id
                );
                false
            }
        }
    }

    /// The request currently awaiting an answer.
    pub fn outstanding(&self) -> Option<InputRequest> {
        self.slot().as_ref().map(|armed| armed.request.clone())
    }

    fn disarm(&self, id: u64) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|armed| armed.id == id) {
            *slot = None;
        }
    }
}

/// An armed request waiting to be answered.
pub struct PendingInput<'a> {
    channel: &'a InputChannel,
    id: u64,
    kind: InputKind,
    rx: oneshot::Receiver<String>,
}

impl PendingInput<'_> {
    pub fn kind(&self) -> InputKind {
        self.kind
    }

    /// Wait for the answer, the deadline, or cancellation, whichever is first.
    pub async fn wait(mut self, timeout: Duration, cancel: &CancellationToken) -> InputOutcome {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => InputOutcome::Cancelled,
            res = &mut self.rx => match res {
                Ok(value) => InputOutcome::Value(value),
                Err(_) => InputOutcome::Cancelled,
            },
            _ = tokio::time::sleep(timeout) => InputOutcome::TimedOut,
        };

        self.channel.disarm(self.id);

        // An answer may have slipped in between the deadline and disarming.
        if outcome == InputOutcome::TimedOut {
            if let Ok(value) = self.rx.try_recv() {
                return InputOutcome::Value(value);
            }
        }
        outcome
    }
}

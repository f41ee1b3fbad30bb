//! Mock reference clock for testing.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::clock::{ClockError, ClockSource};

#[derive(Debug)]
struct ClockState {
    drift: Duration,
    failing: bool,
}

impl Default for ClockState {
    fn default() -> Self {
        Self {
            drift: Duration::zero(),
            failing: false,
        }
    }
}

/// Mock implementation of the [`ClockSource`] trait.
///
/// Local time is the system clock; the reference clock runs `drift` ahead of it.
#[derive(Debug, Default)]
pub struct MockClock {
    state: Mutex<ClockState>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_drift(&self, drift: Duration) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).drift = drift;
    }

    /// Make the reference clock unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).failing = failing;
    }
}

#[async_trait]
impl ClockSource for MockClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn remote_now(&self) -> Result<DateTime<Utc>, ClockError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.failing {
            return Err(ClockError::MissingDate);
        }
        Ok(Utc::now() + state.drift)
    }
}

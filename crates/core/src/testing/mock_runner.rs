//! Mock booking runner for testing.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::booking::{BookingConfig, BookingResult};
use crate::bot::{BookingRunner, RunError};

#[derive(Debug, Default)]
struct RunnerState {
    outcomes: VecDeque<Result<BookingResult, RunError>>,
    run_ids: Vec<String>,
    delay: Duration,
    in_flight: usize,
    max_in_flight: usize,
}

/// Mock implementation of the [`BookingRunner`] trait.
///
/// Scripted outcomes are returned in order; once they run out every run
/// succeeds with PNR `1234567890`. Tracks how many runs overlapped.
#[derive(Debug, Default)]
pub struct MockBookingRunner {
    state: Mutex<RunnerState>,
}

impl MockBookingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_outcome(&self, outcome: Result<BookingResult, RunError>) {
        self.state().outcomes.push_back(outcome);
    }

    /// How long each run takes.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = delay;
    }

    /// Run ids in the order runs started.
    pub fn run_ids(&self) -> Vec<String> {
        self.state().run_ids.clone()
    }

    pub fn started(&self) -> usize {
        self.state().run_ids.len()
    }

    /// Highest number of runs seen in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }
}

#[async_trait]
impl BookingRunner for MockBookingRunner {
    async fn run(&self, run_id: &str, config: BookingConfig) -> Result<BookingResult, RunError> {
        let delay = {
            let mut state = self.state();
            state.run_ids.push(run_id.to_string());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.in_flight -= 1;
        state
            .outcomes
            .pop_front()
            .unwrap_or_else(|| Ok(BookingResult::success(run_id, &config, "1234567890".to_string())))
    }
}

//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Booking runs (starts, results, step failures)
//! - Input suspensions (requests, timeouts)
//! - Scheduler (job outcomes, clock sync)
//! - Queue (depth, running)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Booking runs
// =============================================================================

/// Runs started total.
pub static RUNS_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("tatkal_runs_started_total", "Total booking runs started").unwrap()
});

/// Run results by status.
pub static RUN_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tatkal_run_results_total", "Total booking results"),
        &["status"], // "success", "failed", "unknown"
    )
    .unwrap()
});

/// Run duration in seconds.
pub static RUN_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tatkal_run_duration_seconds", "Duration of booking runs")
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0]),
        &["status"],
    )
    .unwrap()
});

/// Step failures by step.
pub static STEP_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tatkal_step_failures_total", "Total failed booking steps"),
        &["step"],
    )
    .unwrap()
});

// =============================================================================
// Input suspensions
// =============================================================================

/// Input requests by kind.
pub static INPUT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tatkal_input_requests_total", "Total human input requests"),
        &["kind"], // "captcha", "otp"
    )
    .unwrap()
});

/// Input waits that hit the deadline, by kind.
pub static INPUT_TIMEOUTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tatkal_input_timeouts_total",
            "Total human input requests that timed out",
        ),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Scheduler
// =============================================================================

/// Scheduled jobs by terminal status.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tatkal_jobs_finished_total", "Total scheduled jobs finished"),
        &["status"], // "completed", "failed", "error", "cancelled"
    )
    .unwrap()
});

/// Clock sync attempts by outcome.
pub static CLOCK_SYNCS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tatkal_clock_syncs_total", "Total clock sync attempts"),
        &["result"], // "success", "failed", "skipped"
    )
    .unwrap()
});

/// Last measured drift of the remote clock against the local one.
pub static CLOCK_DRIFT_MS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tatkal_clock_drift_milliseconds",
        "Last measured remote minus local clock drift",
    )
    .unwrap()
});

// =============================================================================
// Queue
// =============================================================================

/// Items waiting for a slot.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("tatkal_queue_depth", "Queued bookings waiting for a slot").unwrap()
});

/// Items currently running.
pub static QUEUE_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("tatkal_queue_running", "Queued bookings currently running").unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Runs
        Box::new(RUNS_STARTED.clone()),
        Box::new(RUN_RESULTS.clone()),
        Box::new(RUN_DURATION.clone()),
        Box::new(STEP_FAILURES.clone()),
        // Input
        Box::new(INPUT_REQUESTS.clone()),
        Box::new(INPUT_TIMEOUTS.clone()),
        // Scheduler
        Box::new(JOBS_FINISHED.clone()),
        Box::new(CLOCK_SYNCS.clone()),
        Box::new(CLOCK_DRIFT_MS.clone()),
        // Queue
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(QUEUE_RUNNING.clone()),
    ]
}

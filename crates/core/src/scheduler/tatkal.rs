//! Single-fire booking timers corrected against a reference clock.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::booking::{BookingConfig, TravelClass};
use crate::bot::BookingRunner;
use crate::clock::{measure_drift, ClockError, ClockSource};
use crate::events::{BookingEvent, EventHandle};
use crate::metrics::{CLOCK_DRIFT_MS, CLOCK_SYNCS, JOBS_FINISHED};

use super::opening::OpeningRules;
use super::types::{JobStatus, ScheduledJob, ScheduledJobSummary, SchedulerError};

struct JobEntry {
    job: ScheduledJob,
    timer: CancellationToken,
}

struct SchedulerInner {
    jobs: Mutex<HashMap<String, JobEntry>>,
    runner: Arc<dyn BookingRunner>,
    clock: Arc<dyn ClockSource>,
    rules: OpeningRules,
    events: EventHandle,
    resync_lead: Duration,
}

/// Fires each scheduled booking exactly once at its (corrected) instant.
#[derive(Clone)]
pub struct TatkalScheduler {
    inner: Arc<SchedulerInner>,
}

impl TatkalScheduler {
    pub fn new(
        runner: Arc<dyn BookingRunner>,
        clock: Arc<dyn ClockSource>,
        rules: OpeningRules,
        events: EventHandle,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                jobs: Mutex::new(HashMap::new()),
                runner,
                clock,
                rules,
                events,
                resync_lead: Duration::ZERO,
            }),
        }
    }

    /// Measure drift again `lead` before each fire instant. Zero disables it.
    pub fn with_resync_lead(mut self, lead: Duration) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.resync_lead = lead,
            None => warn!("Scheduler already shared, keeping its resync setting"),
        }
        self
    }

    pub fn rules(&self) -> &OpeningRules {
        &self.inner.rules
    }

    /// Schedule `config` to run at `desired`, corrected for clock drift.
    ///
    /// A failing time authority only disables the correction.
    pub async fn schedule(&self, config: BookingConfig, desired: DateTime<Utc>) -> String {
        let id = format!("tatkal_{}", Uuid::new_v4().simple());
        let (fire_at, drift_ms) = self.inner.corrected(desired).await;
        let now = Utc::now();

        let job = ScheduledJob {
            id: id.clone(),
            config,
            requested_at: desired,
            fire_at,
            drift_ms,
            status: JobStatus::Scheduled,
            created_at: now,
            started_at: None,
            finished_at: None,
            result: None,
            error: None,
        };
        let journey = job.config.journey_summary();

        let timer = CancellationToken::new();
        self.inner.jobs().insert(
            id.clone(),
            JobEntry {
                job,
                timer: timer.clone(),
            },
        );

        info!(
            "Scheduled job {} ({} -> {} on {}) to fire at {}",
            id, journey.from_station, journey.to_station, journey.journey_date, fire_at
        );
        self.inner.events.emit(BookingEvent::JobScheduled {
            job_id: id.clone(),
            fire_at,
        });

        tokio::spawn(SchedulerInner::run_job(self.inner.clone(), id.clone(), timer));
        id
    }

    /// Schedule at the quota opening instant for the journey.
    pub async fn schedule_at_opening(
        &self,
        config: BookingConfig,
    ) -> Result<String, SchedulerError> {
        let opening = self
            .inner
            .rules
            .opening_instant(config.journey_date, config.travel_class);
        if self.is_opening_time_passed(config.journey_date, config.travel_class) {
            return Err(SchedulerError::OpeningPassed { opening });
        }
        Ok(self.schedule(config, opening).await)
    }

    /// Cancel a job that has not fired yet.
    ///
    /// Returns false for unknown jobs and for jobs that already fired or ended.
    pub fn cancel(&self, job_id: &str) -> bool {
        let mut jobs = self.inner.jobs();
        let Some(entry) = jobs.get_mut(job_id) else {
            debug!("Cancel for unknown job {}", job_id);
            return false;
        };
        if entry.job.status != JobStatus::Scheduled || !entry.job.advance(JobStatus::Cancelled) {
            debug!(
                "Job {} is {}, not cancelling",
                job_id,
                entry.job.status.as_str()
            );
            return false;
        }
        entry.timer.cancel();
        drop(jobs);

        info!("Cancelled job {}", job_id);
        JOBS_FINISHED
            .with_label_values(&[JobStatus::Cancelled.as_str()])
            .inc();
        self.inner.events.emit(BookingEvent::JobUpdated {
            job_id: job_id.to_string(),
            status: JobStatus::Cancelled,
        });
        true
    }

    pub fn get(&self, job_id: &str) -> Result<ScheduledJob, SchedulerError> {
        self.inner
            .jobs()
            .get(job_id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))
    }

    /// All known jobs, soonest first.
    pub fn get_scheduled(&self) -> Vec<ScheduledJobSummary> {
        let mut jobs: Vec<ScheduledJobSummary> = self
            .inner
            .jobs()
            .values()
            .map(|entry| entry.job.summary())
            .collect();
        jobs.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub fn is_opening_time_passed(&self, journey_date: NaiveDate, travel_class: TravelClass) -> bool {
        self.inner
            .rules
            .is_opening_time_passed(journey_date, travel_class, self.inner.clock.now())
    }

    pub fn time_until_opening(&self, journey_date: NaiveDate, travel_class: TravelClass) -> Duration {
        self.inner
            .rules
            .time_until_opening(journey_date, travel_class, self.inner.clock.now())
    }

    /// Cancel every job that has not fired. Running jobs finish normally.
    pub fn shutdown(&self) -> usize {
        let pending: Vec<String> = self
            .inner
            .jobs()
            .iter()
            .filter(|(_, entry)| entry.job.status == JobStatus::Scheduled)
            .map(|(id, _)| id.clone())
            .collect();

        let cancelled = pending.iter().filter(|id| self.cancel(id)).count();
        info!("Scheduler shut down, cancelled {} pending jobs", cancelled);
        cancelled
    }
}

impl SchedulerInner {
    fn jobs(&self) -> MutexGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `desired + (remote - local)`, or `desired` when no measurement is possible.
    async fn corrected(&self, desired: DateTime<Utc>) -> (DateTime<Utc>, Option<i64>) {
        match measure_drift(self.clock.as_ref()).await {
            Ok(drift) => {
                let drift_ms = drift.num_milliseconds();
                CLOCK_SYNCS.with_label_values(&["success"]).inc();
                CLOCK_DRIFT_MS.set(drift_ms);
                info!("Measured clock drift of {}ms", drift_ms);
                (desired + drift, Some(drift_ms))
            }
            Err(ClockError::NotConfigured) => {
                CLOCK_SYNCS.with_label_values(&["skipped"]).inc();
                (desired, None)
            }
            Err(e) => {
                CLOCK_SYNCS.with_label_values(&["failed"]).inc();
                warn!("Clock sync failed, using local time: {}", e);
                (desired, None)
            }
        }
    }

    fn fire_at(&self, job_id: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.jobs()
            .get(job_id)
            .map(|entry| (entry.job.requested_at, entry.job.fire_at))
    }

    fn retime(&self, job_id: &str, fire_at: DateTime<Utc>, drift_ms: Option<i64>) {
        let mut jobs = self.jobs();
        if let Some(entry) = jobs.get_mut(job_id) {
            entry.job.fire_at = fire_at;
            entry.job.drift_ms = drift_ms;
            debug!("Job {} re-synced to fire at {}", job_id, fire_at);
        }
    }

    fn remaining(&self, until: DateTime<Utc>) -> Duration {
        (until - self.clock.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Sleep until the job's fire instant by the local clock, never returning early.
    async fn wait_until_due(&self, job_id: &str) {
        let Some((requested_at, mut fire_at)) = self.fire_at(job_id) else {
            return;
        };

        if !self.resync_lead.is_zero() && self.remaining(fire_at) > self.resync_lead {
            tokio::time::sleep(self.remaining(fire_at) - self.resync_lead).await;
            let (resynced, drift_ms) = self.corrected(requested_at).await;
            if drift_ms.is_some() {
                self.retime(job_id, resynced, drift_ms);
                fire_at = resynced;
            }
        }

        loop {
            let remaining = self.remaining(fire_at);
            if remaining.is_zero() {
                return;
            }
            tokio::time::sleep(remaining).await;
        }
    }

    async fn run_job(inner: Arc<Self>, job_id: String, timer: CancellationToken) {
        tokio::select! {
            _ = timer.cancelled() => {
                debug!("Timer for job {} cancelled", job_id);
                return;
            }
            _ = inner.wait_until_due(&job_id) => {}
        }

        let config = {
            let mut jobs = inner.jobs();
            match jobs.get_mut(&job_id) {
                Some(entry) => {
                    if !entry.job.advance(JobStatus::Running) {
                        return;
                    }
                    entry.job.config.clone()
                }
                None => return,
            }
        };

        info!("Firing job {}", job_id);
        inner.events.emit(BookingEvent::JobUpdated {
            job_id: job_id.clone(),
            status: JobStatus::Running,
        });

        let outcome = AssertUnwindSafe(inner.runner.run(&job_id, config))
            .catch_unwind()
            .await;

        let (status, result, failure) = match outcome {
            Ok(Ok(result)) => (JobStatus::from_result(&result), Some(result), None),
            Ok(Err(e)) => {
                error!("Job {} could not run: {}", job_id, e);
                (JobStatus::Error, None, Some(e.to_string()))
            }
            Err(_) => {
                error!("Job {} panicked", job_id);
                (JobStatus::Error, None, Some("run panicked".to_string()))
            }
        };

        {
            let mut jobs = inner.jobs();
            if let Some(entry) = jobs.get_mut(&job_id) {
                if entry.job.advance(status) {
                    entry.job.result = result;
                    entry.job.error = failure;
                }
            }
        }

        info!("Job {} finished as {}", job_id, status.as_str());
        JOBS_FINISHED.with_label_values(&[status.as_str()]).inc();
        inner.events.emit(BookingEvent::JobUpdated { job_id, status });
    }
}

//! The booking run state machine.
//!
//! A run walks a fixed list of steps. Each step returns a result and the
//! driver loop decides whether to continue, finish, or take the failure path.
//! The browser session is acquired at `browser_init` and released exactly
//! once on every exit path, including panics inside a step.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::automation::{AutomationSurface, SurfaceLauncher};
use crate::booking::{BookingConfig, BookingResult, BookingStatus};
use crate::credentials::CredentialProvider;
use crate::events::{BookingEvent, EventHandle, Severity};
use crate::input::{InputChannel, InputKind, InputOutcome, InputRequest};
use crate::metrics::{INPUT_TIMEOUTS, RUNS_STARTED, RUN_DURATION, RUN_RESULTS, STEP_FAILURES};

use super::types::{BotError, BotSettings, BotStatus, BotStep};

/// Steps executed after the browser is up, in order.
const FLOW: [BotStep; 6] = [
    BotStep::Login,
    BotStep::TrainSearch,
    BotStep::TrainSelection,
    BotStep::PassengerDetails,
    BotStep::Payment,
    BotStep::Confirmation,
];

/// What the driver does after a step.
pub(super) enum StepOutcome {
    Next,
    Done(BookingResult),
}

/// One booking run.
pub struct BookingBot {
    pub(super) run_id: String,
    pub(super) config: BookingConfig,
    pub(super) settings: BotSettings,
    launcher: Arc<dyn SurfaceLauncher>,
    pub(super) credentials: Arc<dyn CredentialProvider>,
    events: EventHandle,
    input: InputChannel,
    status: RwLock<BotStatus>,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl BookingBot {
    pub fn new(
        run_id: impl Into<String>,
        config: BookingConfig,
        settings: BotSettings,
        launcher: Arc<dyn SurfaceLauncher>,
        credentials: Arc<dyn CredentialProvider>,
        events: EventHandle,
    ) -> Self {
        let run_id = run_id.into();
        Self {
            input: InputChannel::new(run_id.clone(), events.clone()),
            status: RwLock::new(BotStatus::idle(&run_id)),
            run_id,
            config,
            settings,
            launcher,
            credentials,
            events,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub fn get_status(&self) -> BotStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The prompt currently waiting for an answer, with its payload.
    pub fn outstanding_input(&self) -> Option<InputRequest> {
        self.input.outstanding()
    }

    /// Ask the run to stop at its next step boundary or suspension.
    ///
    /// Calling it again has no further effect.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            debug!("Run {} already asked to stop", self.run_id);
            return;
        }
        info!("Stop requested for run {}", self.run_id);
        self.cancel.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Answer the outstanding prompt. Returns false, changing nothing, when no
    /// prompt of `kind` is waiting.
    ///
    /// The run clears its waiting flags itself when it resumes.
    pub fn submit_input(&self, kind: InputKind, value: impl Into<String>) -> bool {
        self.input.respond(kind, value)
    }

    /// Execute the booking flow once and produce its result.
    pub async fn run(&self) -> Result<BookingResult, BotError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(BotError::AlreadyStarted);
        }

        RUNS_STARTED.inc();
        let started = Instant::now();
        info!(
            "Starting booking run {}: {} -> {} on {} ({}, {} passengers)",
            self.run_id,
            self.config.from_station,
            self.config.to_station,
            self.config.journey_date,
            self.config.travel_class,
            self.config.passengers.len()
        );
        self.set_status(|status| status.running = true);

        let mut surface = None;
        let outcome = AssertUnwindSafe(self.drive(&mut surface))
            .catch_unwind()
            .await;

        let (result, terminal) = match outcome {
            Ok(Ok(result)) => {
                let terminal = match result.status {
                    BookingStatus::Success => BotStep::Success,
                    BookingStatus::Failed => BotStep::Failed,
                    BookingStatus::Unknown => BotStep::Unknown,
                };
                (result, terminal)
            }
            Ok(Err(BotError::Stopped)) => {
                warn!("Run {} stopped before completion", self.run_id);
                (
                    BookingResult::failed(&self.run_id, &self.config, BotError::Stopped.to_string()),
                    BotStep::Stopped,
                )
            }
            Ok(Err(err)) => (self.failure(err), BotStep::Failed),
            Err(panic) => (
                self.failure(BotError::Internal(panic_message(panic.as_ref()))),
                BotStep::Failed,
            ),
        };

        if let Some(surface) = surface {
            self.release(surface).await;
        }
        self.finish(&result, terminal, started);

        Ok(result)
    }

    async fn drive(
        &self,
        slot: &mut Option<Box<dyn AutomationSurface>>,
    ) -> Result<BookingResult, BotError> {
        self.checkpoint()?;
        self.enter(BotStep::BrowserInit);
        let launched = self
            .launcher
            .launch()
            .await
            .map_err(|e| BotError::Surface(e.to_string()))?;
        debug!(
            "Run {} acquired a {} session",
            self.run_id,
            self.launcher.name()
        );
        let surface: &dyn AutomationSurface = &**slot.insert(launched);

        for step in FLOW {
            self.checkpoint()?;
            self.enter(step);
            match self.execute(step, surface).await? {
                StepOutcome::Next => {}
                StepOutcome::Done(result) => return Ok(result),
            }
        }

        Err(BotError::Internal(
            "booking flow ended without a result".to_string(),
        ))
    }

    async fn execute(
        &self,
        step: BotStep,
        surface: &dyn AutomationSurface,
    ) -> Result<StepOutcome, BotError> {
        match step {
            BotStep::Login => self.login(surface).await.map(|_| StepOutcome::Next),
            BotStep::TrainSearch => self.search_trains(surface).await.map(|_| StepOutcome::Next),
            BotStep::TrainSelection => self.select_train(surface).await.map(|_| StepOutcome::Next),
            BotStep::PassengerDetails => self
                .fill_passenger_details(surface)
                .await
                .map(|_| StepOutcome::Next),
            BotStep::Payment => self.pay(surface).await.map(|_| StepOutcome::Next),
            BotStep::Confirmation => self.confirm(surface).await.map(StepOutcome::Done),
            other => Err(BotError::Internal(format!(
                "{} is not an executable step",
                other
            ))),
        }
    }

    fn checkpoint(&self) -> Result<(), BotError> {
        if self.cancel.is_cancelled() {
            Err(BotError::Stopped)
        } else {
            Ok(())
        }
    }

    /// Publish a prompt and wait for its answer.
    pub(super) async fn suspend(
        &self,
        kind: InputKind,
        payload: Option<String>,
    ) -> Result<String, BotError> {
        self.checkpoint()?;
        let parent = self.get_status().step;
        let step = match kind {
            InputKind::Captcha => BotStep::WaitingCaptcha,
            InputKind::Otp => BotStep::WaitingOtp,
        };
        self.enter_with(step, step.banner(), Severity::Warning);

        let pending = self.input.request(kind, payload);
        self.set_status(|status| {
            status.waiting_for_input = true;
            status.pending_input = Some(kind);
        });

        let timeout = self.settings.input_timeout;
        let outcome = pending.wait(timeout, &self.cancel).await;

        // Back in the step that asked.
        self.set_status(|status| {
            status.step = parent;
            status.waiting_for_input = false;
            status.pending_input = None;
        });

        match outcome {
            InputOutcome::Value(value) => {
                info!("Run {} received {} input", self.run_id, kind);
                self.events.emit(BookingEvent::InputAccepted {
                    run_id: self.run_id.clone(),
                    kind,
                });
                self.notify(format!("{} received, continuing", kind), Severity::Success);
                Ok(value)
            }
            InputOutcome::TimedOut => {
                warn!(
                    "Run {} gave up waiting for {} after {}s",
                    self.run_id,
                    kind,
                    timeout.as_secs()
                );
                INPUT_TIMEOUTS.with_label_values(&[kind.as_str()]).inc();
                Err(BotError::InputTimeout {
                    kind,
                    waited_secs: timeout.as_secs(),
                })
            }
            InputOutcome::Cancelled => Err(BotError::Stopped),
        }
    }

    fn set_status(&self, update: impl FnOnce(&mut BotStatus)) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut status);
        status.updated_at = Utc::now();
    }

    fn enter(&self, step: BotStep) {
        self.enter_with(step, step.banner(), Severity::Info);
    }

    fn enter_with(&self, step: BotStep, message: &str, severity: Severity) {
        info!("Run {} entering {}", self.run_id, step);
        self.set_status(|status| status.step = step);
        self.emit_status(step, message.to_string(), severity);
    }

    /// Publish a message for the current step.
    pub(super) fn notify(&self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        let step = self.get_status().step;
        match severity {
            Severity::Warning => warn!("Run {}: {}", self.run_id, message),
            Severity::Error => error!("Run {}: {}", self.run_id, message),
            _ => info!("Run {}: {}", self.run_id, message),
        }
        self.emit_status(step, message, severity);
    }

    fn emit_status(&self, step: BotStep, message: String, severity: Severity) {
        self.events.emit(BookingEvent::Status {
            run_id: self.run_id.clone(),
            step,
            message,
            severity,
        });
    }

    fn failure(&self, err: BotError) -> BookingResult {
        if let BotError::Step { step, .. } = &err {
            STEP_FAILURES.with_label_values(&[step.as_str()]).inc();
        }
        error!("Run {} failed: {}", self.run_id, err);
        BookingResult::failed(&self.run_id, &self.config, err.to_string())
    }

    async fn release(&self, surface: Box<dyn AutomationSurface>) {
        match surface.close().await {
            Ok(()) => debug!("Run {} released its browser session", self.run_id),
            Err(e) => warn!("Run {} failed to release browser session: {}", self.run_id, e),
        }
    }

    fn finish(&self, result: &BookingResult, terminal: BotStep, started: Instant) {
        self.set_status(|status| {
            status.step = terminal;
            status.running = false;
            status.waiting_for_input = false;
            status.pending_input = None;
        });

        let (message, severity) = match (terminal, result.pnr.as_deref(), result.detail.as_deref()) {
            (BotStep::Success, Some(pnr), _) => (format!("Booking successful! PNR: {}", pnr), Severity::Success),
            (BotStep::Stopped, _, _) => (terminal.banner().to_string(), Severity::Warning),
            (BotStep::Unknown, _, detail) => (
                format!("{}: {}", terminal.banner(), detail.unwrap_or("no detail")),
                Severity::Warning,
            ),
            (_, _, Some(detail)) => (format!("{}: {}", terminal.banner(), detail), Severity::Error),
            _ => (terminal.banner().to_string(), Severity::Error),
        };
        self.emit_status(terminal, message, severity);
        self.events.emit(BookingEvent::Finished {
            result: result.clone(),
        });

        let elapsed = started.elapsed().as_secs_f64();
        RUN_RESULTS
            .with_label_values(&[result.status.as_str()])
            .inc();
        RUN_DURATION
            .with_label_values(&[result.status.as_str()])
            .observe(elapsed);

        info!(
            "Run {} finished as {} in {:.1}s",
            self.run_id,
            result.status.as_str(),
            elapsed
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "run panicked".to_string()
    }
}

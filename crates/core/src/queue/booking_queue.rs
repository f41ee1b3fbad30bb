use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::booking::BookingConfig;
use crate::bot::BookingRunner;
use crate::config::QueueConfig;
use crate::events::{BookingEvent, EventHandle};
use crate::metrics::{QUEUE_DEPTH, QUEUE_RUNNING};

use super::types::{QueueItem, QueueItemStatus, QueueStatus};

#[derive(Default)]
struct QueueState {
    /// Waiting items, kept in admission order.
    pending: Vec<QueueItem>,
    running: HashMap<String, QueueItem>,
    finished: VecDeque<QueueItem>,
    closed: bool,
}

impl QueueState {
    /// Places the item before the first entry with strictly lower priority,
    /// so equal priorities keep insertion order.
    fn insert(&mut self, item: QueueItem) {
        let at = self
            .pending
            .iter()
            .position(|queued| queued.priority < item.priority)
            .unwrap_or(self.pending.len());
        self.pending.insert(at, item);
    }

    fn record_finished(&mut self, item: QueueItem, limit: usize) {
        self.finished.push_back(item);
        while self.finished.len() > limit {
            self.finished.pop_front();
        }
    }
}

struct QueueInner {
    state: Mutex<QueueState>,
    runner: Arc<dyn BookingRunner>,
    max_concurrent: usize,
    history_limit: usize,
    events: EventHandle,
}

/// Runs queued bookings by priority with at most `max_concurrent` in flight.
#[derive(Clone)]
pub struct BookingQueue {
    inner: Arc<QueueInner>,
}

impl BookingQueue {
    pub fn new(
        runner: Arc<dyn BookingRunner>,
        max_concurrent: usize,
        history_limit: usize,
        events: EventHandle,
    ) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                runner,
                max_concurrent,
                history_limit,
                events,
            }),
        }
    }

    pub fn from_config(
        runner: Arc<dyn BookingRunner>,
        config: &QueueConfig,
        events: EventHandle,
    ) -> Self {
        Self::new(runner, config.max_concurrent, config.history_limit, events)
    }

    /// Adds a booking and returns its id. Nothing starts until [`drain`](Self::drain).
    pub fn enqueue(&self, config: BookingConfig, priority: i32) -> String {
        let id = format!("queue_{}", Uuid::new_v4().simple());
        let item = QueueItem::new(id.clone(), config, priority);

        {
            let mut state = self.inner.state();
            state.insert(item);
            self.inner.update_gauges(&state);
        }

        info!("Queued booking {} with priority {}", id, priority);
        self.inner.events.emit(BookingEvent::QueueUpdated {
            item_id: id.clone(),
            status: QueueItemStatus::Queued,
        });
        id
    }

    /// Starts waiting items while run slots are free. Returns how many started.
    ///
    /// Finished runs call this again, so one call keeps the queue moving
    /// until it is empty. Must be called from within a tokio runtime.
    pub fn drain(&self) -> usize {
        self.inner.drain()
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.inner.state();
        let mut running: Vec<&QueueItem> = state.running.values().collect();
        running.sort_by_key(|item| item.started_at);

        let items = state
            .pending
            .iter()
            .chain(running)
            .map(QueueItem::summary)
            .collect();

        QueueStatus {
            queued: state.pending.len(),
            running: state.running.len(),
            items,
        }
    }

    /// Looks up an item among waiting, running, and recently finished ones.
    pub fn get(&self, id: &str) -> Option<QueueItem> {
        let state = self.inner.state();
        state
            .pending
            .iter()
            .find(|item| item.id == id)
            .or_else(|| state.running.get(id))
            .or_else(|| state.finished.iter().rev().find(|item| item.id == id))
            .cloned()
    }

    /// Recently finished items, newest first.
    pub fn history(&self) -> Vec<QueueItem> {
        self.inner.state().finished.iter().rev().cloned().collect()
    }

    /// Stops admitting waiting items. Running items are left to finish.
    pub fn close(&self) {
        let mut state = self.inner.state();
        if !state.closed {
            state.closed = true;
            info!(
                "Booking queue closed with {} waiting item(s)",
                state.pending.len()
            );
        }
    }
}

impl QueueInner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_gauges(&self, state: &QueueState) {
        QUEUE_DEPTH.set(state.pending.len() as i64);
        QUEUE_RUNNING.set(state.running.len() as i64);
    }

    fn drain(self: &Arc<Self>) -> usize {
        let admitted: Vec<(String, BookingConfig)> = {
            let mut state = self.state();
            let mut admitted = Vec::new();
            while !state.closed
                && state.running.len() < self.max_concurrent
                && !state.pending.is_empty()
            {
                let mut item = state.pending.remove(0);
                item.status = QueueItemStatus::Running;
                item.started_at = Some(Utc::now());
                admitted.push((item.id.clone(), item.config.clone()));
                state.running.insert(item.id.clone(), item);
            }
            self.update_gauges(&state);
            admitted
        };

        for (id, config) in &admitted {
            debug!("Admitting queued booking {}", id);
            self.events.emit(BookingEvent::QueueUpdated {
                item_id: id.clone(),
                status: QueueItemStatus::Running,
            });
            tokio::spawn(Self::run_item(Arc::clone(self), id.clone(), config.clone()));
        }
        admitted.len()
    }

    async fn run_item(inner: Arc<Self>, id: String, config: BookingConfig) {
        let outcome = AssertUnwindSafe(inner.runner.run(&id, config))
            .catch_unwind()
            .await;

        let (status, result, failure) = match outcome {
            Ok(Ok(result)) => (QueueItemStatus::from_result(&result), Some(result), None),
            Ok(Err(e)) => {
                error!("Queued booking {} could not run: {}", id, e);
                (QueueItemStatus::Error, None, Some(e.to_string()))
            }
            Err(_) => {
                error!("Queued booking {} panicked", id);
                (QueueItemStatus::Error, None, Some("run panicked".to_string()))
            }
        };

        {
            let mut state = inner.state();
            if let Some(mut item) = state.running.remove(&id) {
                item.status = status;
                item.finished_at = Some(Utc::now());
                item.result = result;
                item.error = failure;
                state.record_finished(item, inner.history_limit);
            }
            inner.update_gauges(&state);
        }

        info!("Queued booking {} finished as {}", id, status.as_str());
        inner.events.emit(BookingEvent::QueueUpdated {
            item_id: id,
            status,
        });

        inner.drain();
    }
}

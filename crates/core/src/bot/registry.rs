//! Live runs addressable by id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::input::InputKind;

use super::pipeline::BookingBot;
use super::types::BotStatus;

/// Every run currently executing, keyed by run id.
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, Arc<BookingBot>>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a run with the same id is already registered.
    pub async fn register(&self, bot: Arc<BookingBot>) -> bool {
        let mut runs = self.runs.write().await;
        if runs.contains_key(bot.run_id()) {
            return false;
        }
        debug!("Registered run {}", bot.run_id());
        runs.insert(bot.run_id().to_string(), bot);
        true
    }

    pub async fn unregister(&self, run_id: &str) -> Option<Arc<BookingBot>> {
        let removed = self.runs.write().await.remove(run_id);
        if removed.is_some() {
            debug!("Unregistered run {}", run_id);
        }
        removed
    }

    pub async fn get(&self, run_id: &str) -> Option<Arc<BookingBot>> {
        self.runs.read().await.get(run_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.runs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.runs.read().await.is_empty()
    }

    /// Status of every live run, ordered by run id.
    pub async fn statuses(&self) -> Vec<BotStatus> {
        let mut statuses: Vec<BotStatus> = self
            .runs
            .read()
            .await
            .values()
            .map(|bot| bot.get_status())
            .collect();
        statuses.sort_by(|a, b| a.run_id.cmp(&b.run_id));
        statuses
    }

    /// Returns false if the run is unknown.
    pub async fn stop(&self, run_id: &str) -> bool {
        match self.get(run_id).await {
            Some(bot) => {
                bot.stop();
                true
            }
            None => false,
        }
    }

    pub async fn stop_all(&self) {
        for bot in self.runs.read().await.values() {
            bot.stop();
        }
    }

    /// Deliver input to a specific run.
    ///
    /// `None` when the run is unknown, otherwise whether the input was accepted.
    pub async fn submit_input(&self, run_id: &str, kind: InputKind, value: &str) -> Option<bool> {
        let bot = self.get(run_id).await?;
        Some(bot.submit_input(kind, value))
    }

    /// Deliver input to whichever run is waiting for `kind`.
    ///
    /// Returns the id of the run that accepted it.
    pub async fn submit_to_waiting(&self, kind: InputKind, value: &str) -> Option<String> {
        let runs = self.runs.read().await;
        runs.values()
            .filter(|bot| bot.get_status().pending_input == Some(kind))
            .find(|bot| bot.submit_input(kind, value))
            .map(|bot| bot.run_id().to_string())
    }
}

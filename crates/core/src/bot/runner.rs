//! Constructing and executing runs on behalf of the queue and scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::automation::SurfaceLauncher;
use crate::booking::{BookingConfig, BookingResult};
use crate::credentials::CredentialProvider;
use crate::events::EventHandle;
use crate::results::ResultStore;

use super::pipeline::BookingBot;
use super::registry::RunRegistry;
use super::types::{BotError, BotSettings};

/// A run could not be brought to the point of producing a result.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Run {0} is already active")]
    Duplicate(String),

    #[error("Failed to start run: {0}")]
    Start(String),

    #[error(transparent)]
    Bot(#[from] BotError),
}

/// Executes one booking to completion.
#[async_trait]
pub trait BookingRunner: Send + Sync {
    async fn run(&self, run_id: &str, config: BookingConfig) -> Result<BookingResult, RunError>;
}

/// Fresh id for an ad-hoc run.
pub fn new_run_id() -> String {
    format!("run_{}", Uuid::new_v4().simple())
}

/// Builds bots sharing one launcher, credential source, and event sink.
#[derive(Clone)]
pub struct BotFactory {
    settings: BotSettings,
    launcher: Arc<dyn SurfaceLauncher>,
    credentials: Arc<dyn CredentialProvider>,
    events: EventHandle,
}

impl BotFactory {
    pub fn new(
        settings: BotSettings,
        launcher: Arc<dyn SurfaceLauncher>,
        credentials: Arc<dyn CredentialProvider>,
        events: EventHandle,
    ) -> Self {
        Self {
            settings,
            launcher,
            credentials,
            events,
        }
    }

    pub fn create(&self, run_id: &str, config: BookingConfig) -> BookingBot {
        BookingBot::new(
            run_id,
            config,
            self.settings.clone(),
            self.launcher.clone(),
            self.credentials.clone(),
            self.events.clone(),
        )
    }
}

/// Production runner: register, run, persist, unregister.
pub struct BotRunner {
    factory: BotFactory,
    registry: RunRegistry,
    store: Option<Arc<dyn ResultStore>>,
}

impl BotRunner {
    pub fn new(
        factory: BotFactory,
        registry: RunRegistry,
        store: Option<Arc<dyn ResultStore>>,
    ) -> Self {
        Self {
            factory,
            registry,
            store,
        }
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }
}

#[async_trait]
impl BookingRunner for BotRunner {
    async fn run(&self, run_id: &str, config: BookingConfig) -> Result<BookingResult, RunError> {
        let bot = Arc::new(self.factory.create(run_id, config));
        if !self.registry.register(bot.clone()).await {
            return Err(RunError::Duplicate(run_id.to_string()));
        }

        let outcome = bot.run().await;
        self.registry.unregister(run_id).await;
        let result = outcome?;

        if let Some(ref store) = self.store {
            match store.insert(&result) {
                Ok(()) => info!("Stored result of run {}", run_id),
                Err(e) => error!("Failed to store result of run {}: {}", run_id, e),
            }
        }

        Ok(result)
    }
}

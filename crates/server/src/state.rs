use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tatkal_core::{
    BookingQueue, BookingRunner, Config, CredentialSealer, PassengerStore, ResultStore,
    RunRegistry, SanitizedConfig, TatkalScheduler,
};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    registry: RunRegistry,
    runner: Arc<dyn BookingRunner>,
    scheduler: TatkalScheduler,
    queue: BookingQueue,
    results: Arc<dyn ResultStore>,
    passengers: Arc<dyn PassengerStore>,
    sealer: Option<CredentialSealer>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        registry: RunRegistry,
        runner: Arc<dyn BookingRunner>,
        scheduler: TatkalScheduler,
        queue: BookingQueue,
        results: Arc<dyn ResultStore>,
        passengers: Arc<dyn PassengerStore>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            registry,
            runner,
            scheduler,
            queue,
            results,
            passengers,
            sealer: None,
            ws_broadcaster,
        }
    }

    /// Enable sealing credentials over the API.
    pub fn with_sealer(mut self, sealer: CredentialSealer) -> Self {
        self.sealer = Some(sealer);
        self
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    pub fn runner(&self) -> Arc<dyn BookingRunner> {
        Arc::clone(&self.runner)
    }

    pub fn scheduler(&self) -> &TatkalScheduler {
        &self.scheduler
    }

    pub fn queue(&self) -> &BookingQueue {
        &self.queue
    }

    pub fn results(&self) -> &dyn ResultStore {
        self.results.as_ref()
    }

    pub fn passengers(&self) -> &dyn PassengerStore {
        self.passengers.as_ref()
    }

    pub fn sealer(&self) -> Option<&CredentialSealer> {
        self.sealer.as_ref()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }

    /// Today's date at the booking site, used to validate journey dates.
    pub fn site_today(&self) -> NaiveDate {
        let offset = self.scheduler.rules().utc_offset();
        Utc::now().with_timezone(&offset).date_naive()
    }
}

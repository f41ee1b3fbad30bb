pub mod automation;
pub mod booking;
pub mod bot;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod events;
pub mod input;
pub mod metrics;
pub mod queue;
pub mod results;
pub mod scheduler;
pub mod testing;

pub use automation::{AutomationSurface, SurfaceError, SurfaceLauncher, WebDriverLauncher};
pub use booking::{
    validate_booking, validate_credentials, validate_input, validate_passengers, BookingConfig,
    BookingResult, BookingStatus, Passenger, TravelClass, ValidationError,
};
pub use bot::{
    new_run_id, BookingBot, BookingRunner, BotError, BotFactory, BotRunner, BotSettings,
    BotStatus, BotStep, RunError, RunRegistry,
};
pub use clock::{ClockSource, HttpDateClock, LocalClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use credentials::{
    ConfigCredentialProvider, CredentialError, CredentialProvider, CredentialSealer, Credentials,
};
pub use events::{create_event_bus, BookingEvent, EventEnvelope, EventHandle, Severity};
pub use input::InputKind;
pub use queue::{BookingQueue, QueueStatus};
pub use results::{PassengerStore, ResultStore, SavedPassengers, SqliteResultStore};
pub use scheduler::{compute_opening_time, OpeningRules, TatkalScheduler};

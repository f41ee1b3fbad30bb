//! The automation pipeline: one `BookingBot` per booking run.

mod pipeline;
mod registry;
mod runner;
pub mod selectors;
mod steps;
mod types;

pub use pipeline::BookingBot;
pub use registry::RunRegistry;
pub use runner::{new_run_id, BookingRunner, BotFactory, BotRunner, RunError};
pub use types::{BotError, BotSettings, BotStatus, BotStep};

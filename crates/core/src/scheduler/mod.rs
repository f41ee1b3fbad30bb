//! Deferred bookings that fire at the quota opening instant.

mod opening;
mod tatkal;
mod types;

pub use opening::{compute_opening_time, OpeningRules};
pub use tatkal::TatkalScheduler;
pub use types::{JobStatus, ScheduledJob, ScheduledJobSummary, SchedulerError};

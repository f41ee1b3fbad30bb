//! Priority backlog of bookings with a cap on concurrent runs.

mod booking_queue;
mod types;

pub use booking_queue::BookingQueue;
pub use types::{QueueItem, QueueItemStatus, QueueItemSummary, QueueStatus};

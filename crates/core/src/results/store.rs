use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::booking::{BookingResult, Passenger};

#[derive(Debug, Error)]
pub enum ResultStoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Storage for booking results.
pub trait ResultStore: Send + Sync {
    /// Persist a result. Each run stores exactly one.
    fn insert(&self, result: &BookingResult) -> Result<(), ResultStoreError>;

    /// Most recent results first.
    fn recent(&self, limit: usize) -> Result<Vec<BookingResult>, ResultStoreError>;

    fn get(&self, run_id: &str) -> Result<Option<BookingResult>, ResultStoreError>;
}

/// A passenger list kept for the next booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedPassengers {
    pub passengers: Vec<Passenger>,
    pub saved_at: DateTime<Utc>,
}

/// Storage for the one reusable passenger list.
pub trait PassengerStore: Send + Sync {
    /// Replace the saved list.
    fn save_passengers(
        &self,
        passengers: &[Passenger],
    ) -> Result<SavedPassengers, ResultStoreError>;

    fn load_passengers(&self) -> Result<Option<SavedPassengers>, ResultStoreError>;
}

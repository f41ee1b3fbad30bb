//! Persistence of terminal booking results and the saved passenger list.

mod sqlite;
mod store;

pub use sqlite::SqliteResultStore;
pub use store::{PassengerStore, ResultStore, ResultStoreError, SavedPassengers};

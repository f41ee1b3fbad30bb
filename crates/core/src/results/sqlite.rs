use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{PassengerStore, ResultStore, ResultStoreError, SavedPassengers};
use crate::booking::{BookingResult, BookingStatus, JourneySummary, Passenger};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS booking_results (
        run_id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        pnr TEXT,
        detail TEXT,
        timestamp TEXT NOT NULL,
        journey TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_booking_results_timestamp ON booking_results(timestamp);
    CREATE INDEX IF NOT EXISTS idx_booking_results_status ON booking_results(status);

    CREATE TABLE IF NOT EXISTS saved_passengers (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        passengers TEXT NOT NULL,
        saved_at TEXT NOT NULL
    );
"#;

/// SQLite-backed result and passenger store
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    /// Open or create the database file and its tables
    pub fn new(path: &Path) -> Result<Self, ResultStoreError> {
        let conn = Connection::open(path).map_err(|e| ResultStoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    /// Create an in-memory store (useful for testing)
    pub fn in_memory() -> Result<Self, ResultStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ResultStoreError::Database(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, ResultStoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| ResultStoreError::Database(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ResultStoreError> {
        self.conn
            .lock()
            .map_err(|_| ResultStoreError::Database("connection lock poisoned".to_string()))
    }
}

type RawRow = (String, String, Option<String>, Option<String>, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn parse_status(value: &str) -> Result<BookingStatus, ResultStoreError> {
    match value {
        "success" => Ok(BookingStatus::Success),
        "failed" => Ok(BookingStatus::Failed),
        "unknown" => Ok(BookingStatus::Unknown),
        other => Err(ResultStoreError::Serialization(format!(
            "unknown status '{}'",
            other
        ))),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ResultStoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ResultStoreError::Serialization(e.to_string()))
}

fn into_result(raw: RawRow) -> Result<BookingResult, ResultStoreError> {
    let (run_id, status, pnr, detail, timestamp, journey) = raw;

    let timestamp = parse_timestamp(&timestamp)?;
    let journey: JourneySummary = serde_json::from_str(&journey)
        .map_err(|e| ResultStoreError::Serialization(e.to_string()))?;

    Ok(BookingResult {
        run_id,
        status: parse_status(&status)?,
        pnr,
        detail,
        timestamp,
        journey,
    })
}

impl ResultStore for SqliteResultStore {
    fn insert(&self, result: &BookingResult) -> Result<(), ResultStoreError> {
        let conn = self.conn()?;

        let journey_json = serde_json::to_string(&result.journey)
            .map_err(|e| ResultStoreError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO booking_results (run_id, status, pnr, detail, timestamp, journey) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                result.run_id,
                result.status.as_str(),
                result.pnr,
                result.detail,
                result.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
                journey_json,
            ],
        )
        .map_err(|e| ResultStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<BookingResult>, ResultStoreError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT run_id, status, pnr, detail, timestamp, journey FROM booking_results ORDER BY timestamp DESC LIMIT ?",
            )
            .map_err(|e| ResultStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], read_row)
            .map_err(|e| ResultStoreError::Database(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| ResultStoreError::Database(e.to_string()))?;
            results.push(into_result(raw)?);
        }
        Ok(results)
    }

    fn get(&self, run_id: &str) -> Result<Option<BookingResult>, ResultStoreError> {
        let conn = self.conn()?;

        let raw = conn
            .query_row(
                "SELECT run_id, status, pnr, detail, timestamp, journey FROM booking_results WHERE run_id = ?",
                params![run_id],
                read_row,
            )
            .optional()
            .map_err(|e| ResultStoreError::Database(e.to_string()))?;

        raw.map(into_result).transpose()
    }
}

impl PassengerStore for SqliteResultStore {
    fn save_passengers(
        &self,
        passengers: &[Passenger],
    ) -> Result<SavedPassengers, ResultStoreError> {
        let conn = self.conn()?;

        let saved = SavedPassengers {
            passengers: passengers.to_vec(),
            saved_at: Utc::now().trunc_subsecs(6),
        };
        let passengers_json = serde_json::to_string(&saved.passengers)
            .map_err(|e| ResultStoreError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO saved_passengers (id, passengers, saved_at) VALUES (1, ?, ?)",
            params![
                passengers_json,
                saved.saved_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(|e| ResultStoreError::Database(e.to_string()))?;

        Ok(saved)
    }

    fn load_passengers(&self) -> Result<Option<SavedPassengers>, ResultStoreError> {
        let conn = self.conn()?;

        let raw: Option<(String, String)> = conn
            .query_row(
                "SELECT passengers, saved_at FROM saved_passengers WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| ResultStoreError::Database(e.to_string()))?;

        raw.map(|(passengers, saved_at)| {
            Ok(SavedPassengers {
                passengers: serde_json::from_str(&passengers)
                    .map_err(|e| ResultStoreError::Serialization(e.to_string()))?,
                saved_at: parse_timestamp(&saved_at)?,
            })
        })
        .transpose()
    }
}

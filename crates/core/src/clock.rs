//! Time sources used when computing fire instants.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::DATE, Client};
use thiserror::Error;
use tracing::debug;

/// Errors reading a remote time authority. Never fatal to scheduling.
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("No time authority configured")]
    NotConfigured,

    #[error("Time authority request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Time authority response has no Date header")]
    MissingDate,

    #[error("Invalid Date header '{0}'")]
    InvalidDate(String),
}

/// Local time plus an optional reference clock.
#[async_trait]
pub trait ClockSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current time according to the reference clock.
    async fn remote_now(&self) -> Result<DateTime<Utc>, ClockError>;
}

/// Reads remote and local time once and returns `remote - local`,
/// rounded to the nearest millisecond.
pub async fn measure_drift(clock: &dyn ClockSource) -> Result<chrono::Duration, ClockError> {
    let remote = clock.remote_now().await?;
    let local = clock.now();
    let drift = remote - local;
    let millis = match drift.num_microseconds() {
        Some(micros) => (micros as f64 / 1000.0).round() as i64,
        None => drift.num_milliseconds(),
    };
    Ok(chrono::Duration::milliseconds(millis))
}

/// System clock with no reference.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

#[async_trait]
impl ClockSource for LocalClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn remote_now(&self) -> Result<DateTime<Utc>, ClockError> {
        Err(ClockError::NotConfigured)
    }
}

/// Uses the `Date` header of an HTTP server as the reference clock.
///
/// The header has one-second resolution; half the round trip is added to
/// approximate the server time at the moment the response is read.
pub struct HttpDateClock {
    client: Client,
    url: String,
}

impl HttpDateClock {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClockError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

fn parse_http_date(value: &str) -> Result<DateTime<Utc>, ClockError> {
    DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ClockError::InvalidDate(value.to_string()))
}

#[async_trait]
impl ClockSource for HttpDateClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn remote_now(&self) -> Result<DateTime<Utc>, ClockError> {
        let sent = Utc::now();
        let response = self.client.head(&self.url).send().await?;
        let received = Utc::now();

        let header = response
            .headers()
            .get(DATE)
            .ok_or(ClockError::MissingDate)?
            .to_str()
            .map_err(|_| ClockError::InvalidDate("<non-ascii>".to_string()))?;
        let server_time = parse_http_date(header)?;

        let half_rtt = (received - sent) / 2;
        debug!(
            "Time authority {} reported {} (rtt {}ms)",
            self.url,
            server_time,
            (received - sent).num_milliseconds()
        );
        Ok(server_time + half_rtt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_http_date() {
        let parsed = parse_http_date("Thu, 15 Oct 2026 04:29:58 GMT").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 10, 15, 4, 29, 58).unwrap());
    }

    #[test]
    fn test_parse_http_date_invalid() {
        let err = parse_http_date("yesterday").unwrap_err();
        assert!(matches!(err, ClockError::InvalidDate(_)));
    }

    #[tokio::test]
    async fn test_drift_rounds_to_millis() {
        let clock = crate::testing::MockClock::new();
        clock.set_drift(chrono::Duration::milliseconds(-1500));
        assert_eq!(
            measure_drift(&clock).await.unwrap(),
            chrono::Duration::milliseconds(-1500)
        );
    }

    #[tokio::test]
    async fn test_local_clock_has_no_reference() {
        let clock = LocalClock;
        assert!(matches!(
            clock.remote_now().await,
            Err(ClockError::NotConfigured)
        ));
        assert!(measure_drift(&clock).await.is_err());
    }
}

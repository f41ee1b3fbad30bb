//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a scripted browser injected, so booking runs execute end to end
//! without a WebDriver endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use tatkal_core::config::{CredentialProfile, DatabaseConfig, ServerConfig};
use tatkal_core::testing::MockLauncher;
use tatkal_core::{
    create_event_bus, BookingQueue, BookingRunner, BotFactory, BotRunner, BotSettings, Config,
    ConfigCredentialProvider, CredentialSealer, LocalClock, OpeningRules, PassengerStore,
    ResultStore, RunRegistry, SqliteResultStore, TatkalScheduler,
};
use tatkal_server::api::{create_router, forward_events, WsBroadcaster};
use tatkal_server::state::AppState;

/// Re-export fixtures for test convenience
pub use tatkal_core::testing::fixtures;

/// Key shared by the fixture's provider and its sealing endpoint
pub const SEALING_KEY: &str = "fixture-sealing-key";

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_start() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/bookings/start", fixture.booking_json()).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Scripted browser pages
    pub launcher: MockLauncher,
    pub registry: RunRegistry,
    pub scheduler: TatkalScheduler,
    pub queue: BookingQueue,
    pub results: Arc<dyn ResultStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose browser walks through a successful booking.
    pub async fn new() -> Self {
        Self::with_launcher(fixtures::happy_launcher(), fixtures::bot_settings()).await
    }

    /// Create a fixture driving the given scripted browser.
    pub async fn with_launcher(launcher: MockLauncher, settings: BotSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let mut credentials = BTreeMap::new();
        credentials.insert(
            "primary".to_string(),
            CredentialProfile {
                username: "asha.rao".to_string(),
                password: "s3cret".to_string(),
            },
        );

        // Create config
        let mut config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            credentials,
            ..Default::default()
        };

        config.security.encryption_key = Some(SEALING_KEY.to_string());

        let store =
            Arc::new(SqliteResultStore::new(&db_path).expect("Failed to create result store"));
        let results: Arc<dyn ResultStore> = store.clone();
        let passengers: Arc<dyn PassengerStore> = store;

        // Event bus feeding the WebSocket broadcaster
        let (events, event_rx) = create_event_bus(100);
        let ws_broadcaster = WsBroadcaster::default();
        tokio::spawn(forward_events(event_rx, ws_broadcaster.clone()));

        let registry = RunRegistry::new();
        let factory = BotFactory::new(
            settings,
            Arc::new(launcher.clone()),
            Arc::new(
                ConfigCredentialProvider::new(config.credentials.clone())
                    .with_sealer(CredentialSealer::new(SEALING_KEY).unwrap()),
            ),
            events.clone(),
        );
        let runner: Arc<dyn BookingRunner> = Arc::new(BotRunner::new(
            factory,
            registry.clone(),
            Some(Arc::clone(&results)),
        ));

        // No time authority, so fire instants are exactly what was asked for
        let rules = OpeningRules::from_config(&config.scheduler.opening)
            .expect("Default opening rules are valid");
        let scheduler = TatkalScheduler::new(
            Arc::clone(&runner),
            Arc::new(LocalClock),
            rules,
            events.clone(),
        );
        let queue = BookingQueue::from_config(Arc::clone(&runner), &config.queue, events);

        // Create app state with mocks
        let state = Arc::new(
            AppState::new(
                config,
                registry.clone(),
                runner,
                scheduler.clone(),
                queue.clone(),
                Arc::clone(&results),
                passengers,
                ws_broadcaster,
            )
            .with_sealer(CredentialSealer::new(SEALING_KEY).unwrap()),
        );

        // Create router
        let router = create_router(state);

        Self {
            router,
            launcher,
            registry,
            scheduler,
            queue,
            results,
            temp_dir,
        }
    }

    /// A valid booking request body.
    pub fn booking_json(&self) -> Value {
        serde_json::to_value(fixtures::booking_config()).expect("Booking serializes")
    }

    /// Poll a run until its stored result shows up.
    pub async fn wait_for_result(&self, run_id: &str) -> Value {
        for _ in 0..100 {
            let response = self.get(&format!("/api/v1/runs/{}", run_id)).await;
            if !response.body["result"].is_null() {
                return response.body["result"].clone();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Run {} did not finish in time", run_id);
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Send a request and return status plus the raw text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&body_bytes).into_owned())
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}

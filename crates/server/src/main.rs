use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tatkal_core::config::LogFormat;
use tatkal_core::{
    create_event_bus, load_config, validate_config, BookingQueue, BookingRunner, BotFactory,
    BotRunner, BotSettings, ClockSource, ConfigCredentialProvider, CredentialProvider,
    CredentialSealer, HttpDateClock, LocalClock, OpeningRules, PassengerStore, ResultStore,
    RunRegistry, SanitizedConfig, SqliteResultStore, SurfaceLauncher, TatkalScheduler,
    WebDriverLauncher,
};
use tatkal_server::api::{create_router, forward_events, WsBroadcaster};
use tatkal_server::state::AppState;

/// Buffer size for the engine event bus
const EVENT_BUFFER_SIZE: usize = 1000;

/// How long shutdown waits for stopped runs to release their browsers
const RUN_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

async fn run() -> Result<()> {
    // Determine config path
    let config_path = std::env::var("TATKAL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration; logging needs its format, so initialise right after
    let loaded = load_config(&config_path);
    init_logging(
        loaded
            .as_ref()
            .map(|config| config.logging.format)
            .unwrap_or_default(),
    );
    info!("Loading configuration from {:?}", config_path);
    let config = loaded.with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&SanitizedConfig::from(&config)).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Configuration loaded successfully (fingerprint {})", &config_hash[..16]);
    info!("Database path: {:?}", config.database.path);
    info!("Credential profiles: {}", config.credentials.len());

    // Event bus, forwarded to WebSocket clients
    let (events, event_rx) = create_event_bus(EVENT_BUFFER_SIZE);
    let ws_broadcaster = WsBroadcaster::default();
    let forwarder = tokio::spawn(forward_events(event_rx, ws_broadcaster.clone()));

    // Browser automation
    let launcher: Arc<dyn SurfaceLauncher> = Arc::new(
        WebDriverLauncher::new(config.browser.clone())
            .context("Failed to create WebDriver launcher")?,
    );
    info!(
        "Using {} launcher at {}",
        launcher.name(),
        config.browser.webdriver_url
    );

    // Profiles from config, plus sealed blobs when a key is set
    let mut provider = ConfigCredentialProvider::new(config.credentials.clone());
    let api_sealer = match config.security.encryption_key {
        Some(ref key) => {
            provider = provider.with_sealer(
                CredentialSealer::new(key).context("Invalid credential encryption key")?,
            );
            info!("Sealed credentials enabled");
            Some(CredentialSealer::new(key).context("Invalid credential encryption key")?)
        }
        None => None,
    };
    let credentials: Arc<dyn CredentialProvider> = Arc::new(provider);

    // Create SQLite store for results and saved passengers
    let store = Arc::new(
        SqliteResultStore::new(&config.database.path)
            .context("Failed to create result store")?,
    );
    let results: Arc<dyn ResultStore> = store.clone();
    let passengers: Arc<dyn PassengerStore> = store;
    info!("Result store initialized");

    // Runner shared by the queue, the scheduler, and ad-hoc starts
    let registry = RunRegistry::new();
    let factory = BotFactory::new(
        BotSettings::from(&config.booking),
        launcher,
        credentials,
        events.clone(),
    );
    let runner: Arc<dyn BookingRunner> = Arc::new(BotRunner::new(
        factory,
        registry.clone(),
        Some(Arc::clone(&results)),
    ));

    // Scheduler with optional drift correction
    let clock: Arc<dyn ClockSource> = match config.scheduler.time_authority_url {
        Some(ref url) => {
            info!("Using time authority {}", url);
            Arc::new(
                HttpDateClock::new(
                    url.clone(),
                    Duration::from_secs(config.scheduler.sync_timeout_secs),
                )
                .context("Failed to create time authority client")?,
            )
        }
        None => {
            info!("No time authority configured, drift correction disabled");
            Arc::new(LocalClock)
        }
    };
    let rules = OpeningRules::from_config(&config.scheduler.opening)
        .context("Invalid reservation opening rules")?;
    let scheduler = TatkalScheduler::new(Arc::clone(&runner), clock, rules, events.clone())
        .with_resync_lead(Duration::from_secs(config.scheduler.resync_lead_secs));
    info!("Tatkal scheduler started");

    let queue = BookingQueue::from_config(Arc::clone(&runner), &config.queue, events.clone());
    info!(
        "Booking queue started (max {} concurrent)",
        config.queue.max_concurrent
    );

    // Create app state
    let mut state = AppState::new(
        config.clone(),
        registry.clone(),
        runner,
        scheduler.clone(),
        queue.clone(),
        results,
        passengers,
        ws_broadcaster,
    );
    if let Some(sealer) = api_sealer {
        state = state.with_sealer(sealer);
    }
    let state = Arc::new(state);

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    let cancelled = scheduler.shutdown();
    info!("Cancelled {} pending scheduled job(s)", cancelled);
    queue.close();

    // Stop live runs and give them a chance to release their browser sessions
    registry.stop_all().await;
    let drained = tokio::time::timeout(RUN_DRAIN_TIMEOUT, async {
        while !registry.is_empty().await {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            "{} run(s) still active after {:?}",
            registry.len().await,
            RUN_DRAIN_TIMEOUT
        );
    }

    forwarder.abort();
    info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub booking: BookingFlowConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Named login profiles, referenced by `BookingConfig::credentials`.
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialProfile>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5000
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("tatkal.db")
}

/// Target site and per-step time budgets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookingFlowConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_search_path")]
    pub search_path: String,
    /// Budget for ordinary page waits.
    #[serde(default = "default_page_timeout")]
    pub page_timeout_secs: u64,
    /// How long a captcha or OTP prompt stays open.
    #[serde(default = "default_input_timeout")]
    pub input_timeout_secs: u64,
    #[serde(default = "default_payment_timeout")]
    pub payment_timeout_secs: u64,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

impl Default for BookingFlowConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_path: default_search_path(),
            page_timeout_secs: default_page_timeout(),
            input_timeout_secs: default_input_timeout(),
            payment_timeout_secs: default_payment_timeout(),
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://www.irctc.co.in".to_string()
}

fn default_search_path() -> String {
    "/nget/train-search".to_string()
}

fn default_page_timeout() -> u64 {
    30
}

fn default_input_timeout() -> u64 {
    300
}

fn default_payment_timeout() -> u64 {
    180
}

fn default_confirmation_timeout() -> u64 {
    30
}

/// Scheduler configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// HTTP endpoint whose `Date` header is trusted as the reference clock.
    /// Drift correction is skipped when unset.
    #[serde(default)]
    pub time_authority_url: Option<String>,
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_secs: u64,
    /// Measure drift again this many seconds before firing. 0 disables.
    #[serde(default)]
    pub resync_lead_secs: u64,
    #[serde(default)]
    pub opening: OpeningConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_authority_url: None,
            sync_timeout_secs: default_sync_timeout(),
            resync_lead_secs: 0,
            opening: OpeningConfig::default(),
        }
    }
}

fn default_sync_timeout() -> u64 {
    5
}

/// Daily opening times, in the booking site's local time.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpeningConfig {
    /// Opening for the premium classes (1A, 2A, 3A, CC, EC).
    #[serde(default = "default_ac_time")]
    pub ac_time: String,
    #[serde(default = "default_non_ac_time")]
    pub non_ac_time: String,
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
}

impl Default for OpeningConfig {
    fn default() -> Self {
        Self {
            ac_time: default_ac_time(),
            non_ac_time: default_non_ac_time(),
            utc_offset: default_utc_offset(),
        }
    }
}

fn default_ac_time() -> String {
    "10:00".to_string()
}

fn default_non_ac_time() -> String {
    "11:00".to_string()
}

fn default_utc_offset() -> String {
    "+05:30".to_string()
}

/// Booking queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Finished items kept for status queries.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_max_concurrent() -> usize {
    1
}

fn default_history_limit() -> usize {
    100
}

/// WebDriver browser configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_page_load_timeout")]
    pub page_load_timeout_secs: u64,
    /// Timeout for a single call to the driver.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: None,
            poll_interval_ms: default_poll_interval(),
            page_load_timeout_secs: default_page_load_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_poll_interval() -> u64 {
    250
}

fn default_page_load_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    60
}

/// One login profile
#[derive(Clone, Deserialize, Serialize)]
pub struct CredentialProfile {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialProfile")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Secrets for credentials that travel with a booking
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// Shared secret for sealed credential blobs. Only profile names are
    /// accepted when unset.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub booking: BookingFlowConfig,
    pub scheduler: SchedulerConfig,
    pub queue: QueueConfig,
    pub browser: BrowserConfig,
    pub credentials: BTreeMap<String, SanitizedCredentialProfile>,
    pub security: SanitizedSecurityConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSecurityConfig {
    pub encryption_key_configured: bool,
}

/// Login profile with the password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCredentialProfile {
    pub username: String,
    pub password_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            booking: config.booking.clone(),
            scheduler: config.scheduler.clone(),
            queue: config.queue.clone(),
            browser: config.browser.clone(),
            credentials: config
                .credentials
                .iter()
                .map(|(name, profile)| {
                    (
                        name.clone(),
                        SanitizedCredentialProfile {
                            username: profile.username.clone(),
                            password_configured: !profile.password.is_empty(),
                        },
                    )
                })
                .collect(),
            security: SanitizedSecurityConfig {
                encryption_key_configured: config.security.encryption_key.is_some(),
            },
            logging: config.logging.clone(),
        }
    }
}

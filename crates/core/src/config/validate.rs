use super::{types::Config, ConfigError};
use crate::scheduler::OpeningRules;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Booking base URL is set and input timeout is not 0
/// - Queue admits at least one run
/// - Opening times and UTC offset parse
/// - The credential encryption key, when set, is not blank
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Booking validation
    if config.booking.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "booking.base_url cannot be empty".to_string(),
        ));
    }
    if config.booking.input_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "booking.input_timeout_secs cannot be 0".to_string(),
        ));
    }

    // Queue validation
    if config.queue.max_concurrent == 0 {
        return Err(ConfigError::ValidationError(
            "queue.max_concurrent cannot be 0".to_string(),
        ));
    }

    // Scheduler validation
    OpeningRules::from_config(&config.scheduler.opening)?;

    // Security validation
    if let Some(ref key) = config.security.encryption_key {
        if key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "security.encryption_key cannot be blank".to_string(),
            ));
        }
    }

    Ok(())
}

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides, e.g. `TATKAL_QUEUE__MAX_CONCURRENT=2`.
pub const ENV_PREFIX: &str = "TATKAL_";

/// Variable naming the config file itself; never read as an override.
pub const CONFIG_PATH_VAR: &str = "TATKAL_CONFIG";

/// Load configuration from a TOML file, then apply environment overrides.
///
/// Nested keys are separated by a double underscore so that single
/// underscores inside key names survive: `TATKAL_BOOKING__INPUT_TIMEOUT_SECS`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_with_prefix(path, ENV_PREFIX)
}

fn load_with_prefix(path: &Path, prefix: &str) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let path_key = CONFIG_PATH_VAR.trim_start_matches(ENV_PREFIX);
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(prefix).split("__").ignore(&[path_key]))
        .extract()
        .map_err(parse_error)
}

/// Load configuration from a TOML string, without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    Figment::new()
        .merge(Toml::string(toml_str))
        .extract()
        .map_err(parse_error)
}

/// Flatten every reported problem into one message.
fn parse_error(err: figment::Error) -> ConfigError {
    let messages: Vec<String> = err.into_iter().map(|e| e.to_string()).collect();
    ConfigError::ParseError(messages.join("; "))
}

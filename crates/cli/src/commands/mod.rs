pub mod config_cmd;
pub mod decode;
pub mod run;
pub mod tools;

use std::path::Path;
use stepwise_config::{AppConfig, ConfigError};

/// Load the configuration from `path`, or the default location, with
/// environment overrides applied.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let Some(path) = path else {
        return AppConfig::load();
    };
    let mut config = AppConfig::load_from(path)?;
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

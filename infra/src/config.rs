//! Configuration loading
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults from `AppConfig::default()`
//! 2. An optional TOML (or any `config`-supported) file
//! 3. `OTP__*` environment variables, `__` separating nested keys,
//!    e.g. `OTP__VERIFICATION__CODE_LENGTH=6`
//!
//! A `.env` file in the working directory is loaded first when present.

use ::config::{Config, Environment, File};
use std::path::Path;

use otp_shared::AppConfig;

use crate::InfrastructureError;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "OTP";

/// Load and validate the application configuration
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, InfrastructureError> {
    if let Ok(env_file) = dotenvy::dotenv() {
        tracing::debug!(path = %env_file.display(), "Loaded .env file");
    }

    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = path {
        tracing::info!(path = %path.display(), "Loading configuration file");
        builder = builder.add_source(File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    config.validate()?;

    tracing::info!(
        environment = %config.environment,
        cache_backend = ?config.cache.backend,
        providers = config.notification.providers.len(),
        "Configuration loaded"
    );
    Ok(config)
}

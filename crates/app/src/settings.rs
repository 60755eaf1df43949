//! Settings loading.
//!
//! Layers, lowest first: built-in defaults, the settings file, `TRADEPOINT_*`
//! environment variables, then command line flags.

use std::path::{Path, PathBuf};

use anyhow::Context;
use config::{Config, Environment, File};
use tradepoint_domain::SessionSettings;

/// Where credentials are kept when nothing else is configured.
pub const DEFAULT_STORAGE_PATH: &str = ".tradepoint/session.json";

const ENV_PREFIX: &str = "TRADEPOINT";

/// Loads settings from the file and the process environment.
///
/// # Errors
///
/// Returns an error if an explicitly named file is missing or any layer
/// holds a value of the wrong type.
pub fn load(config_file: Option<&Path>) -> anyhow::Result<SessionSettings> {
    load_with(config_file, Environment::with_prefix(ENV_PREFIX))
}

fn load_with(config_file: Option<&Path>, environment: Environment) -> anyhow::Result<SessionSettings> {
    let file = match config_file {
        Some(path) => File::from(path).required(true),
        None => File::with_name("tradepoint").required(false),
    };

    Config::builder()
        .set_default("storage_path", DEFAULT_STORAGE_PATH)?
        .add_source(file)
        .add_source(environment.try_parsing(true))
        .build()
        .context("failed to read settings")?
        .try_deserialize()
        .context("invalid settings")
}

/// Applies command line overrides and validates the result.
///
/// # Errors
///
/// Returns an error if the final settings are not usable.
pub fn finish(
    mut settings: SessionSettings,
    api_url: Option<String>,
    storage: Option<PathBuf>,
) -> anyhow::Result<SessionSettings> {
    if let Some(url) = api_url {
        settings.api_base_url = url;
    }
    if let Some(path) = storage {
        settings.storage_path = Some(path);
    }
    settings.validate()?;
    Ok(settings)
}

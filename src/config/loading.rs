//! Configuration loading functionality.
//!
//! Resolves the config path, generates the default file on first run, and
//! runs parse → validate → apply defaults.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::common::constants::*;
use crate::common::utils::private_path;

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// Returns an error if already set.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// The `--config` directory, if one was given.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

pub fn get_config_path() -> Result<PathBuf> {
    match get_custom_config_dir() {
        Some(dir) => Ok(dir.join(CONFIG_FILE_NAME)),
        None => default_config_path(),
    }
}

/// `$XDG_CONFIG_HOME/keylight/keylight.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Could not determine config directory")?;
    Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration using automatic path detection.
///
/// Creates the default file when the XDG location has none. An explicit
/// `--config` directory must already contain the file.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        if get_custom_config_dir().is_some() {
            bail!(
                "Configuration file not found: {}",
                private_path(&config_path)
            );
        }
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Parse, validate and complete the file at `path`.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        bail!("Configuration file not found: {}", private_path(path));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", private_path(path)))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", private_path(path)))?;

    validate_config(&config)?;
    apply_defaults(&mut config);

    Ok(config)
}

/// Fill every absent field with its default. Optional settings with no
/// default (`device`, `command`, `log_file`) stay `None`.
pub fn apply_defaults(config: &mut Config) {
    config
        .night_start
        .get_or_insert_with(|| DEFAULT_NIGHT_START.to_string());
    config
        .night_end
        .get_or_insert_with(|| DEFAULT_NIGHT_END.to_string());
    config.debounce.get_or_insert(DEFAULT_DEBOUNCE);
    config
        .keep_alive_interval
        .get_or_insert(DEFAULT_KEEP_ALIVE_INTERVAL);
    config
        .display_poll_interval
        .get_or_insert(DEFAULT_DISPLAY_POLL_INTERVAL);
    config.scan_timeout.get_or_insert(DEFAULT_SCAN_TIMEOUT);
    config
        .trigger_on_display_sleep
        .get_or_insert(DEFAULT_TRIGGER_ON_DISPLAY_SLEEP);
    config
        .trigger_on_display_wake
        .get_or_insert(DEFAULT_TRIGGER_ON_DISPLAY_WAKE);
    config
        .trigger_on_system_sleep
        .get_or_insert(DEFAULT_TRIGGER_ON_SYSTEM_SLEEP);
    config
        .trigger_on_screensaver
        .get_or_insert(DEFAULT_TRIGGER_ON_SCREENSAVER);
}

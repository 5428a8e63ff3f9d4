//! Keep-alive mode: hold the light on by resending the command.
//!
//! Shutdown signals reach the async loop through [`super::shutdown_watch`], so
//! the session is disconnected before the process exits.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::ble::{BtleRadio, LightClient, LightCommand};
use crate::common::constants::{EXIT_FAILURE, MAXIMUM_KEEP_ALIVE_INTERVAL};
use crate::common::logger::Log;
use crate::common::utils::format_seconds;
use crate::config::Config;

pub fn handle_keep_alive_command(
    device: Option<String>,
    interval: Option<f64>,
    log_file: Option<String>,
    debug_enabled: bool,
) -> Result<()> {
    log_version!();
    Log::set_timestamps(true);

    let config = super::load_config_or_defaults();
    let _log_guard = log_file
        .map(PathBuf::from)
        .or_else(|| config.log_file_path())
        .map(Log::start_file_logging)
        .transpose()
        .context("Failed to open log file")?;

    let target = super::resolve_target(&config, device.as_deref())?;
    let interval = resolve_interval(interval, &config)?;

    log_block_start!(
        "Keeping light on, resending every {}",
        format_seconds(interval.as_secs_f64())
    );
    match &target.id {
        Some(id) => log_indented!("Device: {id}"),
        None => log_indented!("Device: discover by scan"),
    }

    let shutdown_rx = super::shutdown_watch(debug_enabled)?;

    let runtime = super::build_runtime()?;
    let radio = match runtime.block_on(BtleRadio::open()) {
        Ok(radio) => radio,
        Err(e) => {
            log_error_exit!("{e}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let client = LightClient::new(radio, target).with_debug(debug_enabled);
    if runtime
        .block_on(client.keep_alive(LightCommand::On, interval, shutdown_rx))
        .is_err()
    {
        log_end!();
        std::process::exit(EXIT_FAILURE);
    }

    log_block_start!("Disconnected, keep-alive stopped");
    log_end!();
    Ok(())
}

/// Command-line interval if given, else the configured one.
fn resolve_interval(cli: Option<f64>, config: &Config) -> Result<Duration> {
    match cli {
        Some(secs) if secs > MAXIMUM_KEEP_ALIVE_INTERVAL => anyhow::bail!(
            "--interval must not exceed {MAXIMUM_KEEP_ALIVE_INTERVAL:.0} seconds (got {secs})"
        ),
        Some(secs) => Ok(Duration::from_secs_f64(secs)),
        None => Ok(config.keep_alive_interval()),
    }
}

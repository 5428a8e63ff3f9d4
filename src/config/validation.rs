//! Configuration validation.
//!
//! Only fields present in the file are checked; absent ones take their
//! defaults afterwards. The first problem found rejects the whole file.

use anyhow::{Result, bail};

use super::Config;
use crate::ble::DeviceIdentifier;
use crate::common::constants::*;
use crate::monitor::NightWindow;

pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(device) = config.device.as_deref() {
        if device.trim().is_empty() {
            bail!("device must not be empty (remove the setting to discover the accessory by scanning)");
        }
        if device.parse::<DeviceIdentifier>().is_err() {
            bail!("device '{device}' is not a valid identifier (expected a UUID)");
        }
    }

    let start = config.night_start.as_deref().unwrap_or(DEFAULT_NIGHT_START);
    let end = config.night_end.as_deref().unwrap_or(DEFAULT_NIGHT_END);
    let window = NightWindow::parse(start, end)?;
    if window.is_empty() {
        bail!("night_start and night_end must differ (both are {start})");
    }

    if let Some(debounce) = config.debounce
        && !(MINIMUM_DEBOUNCE..=MAXIMUM_DEBOUNCE).contains(&debounce)
    {
        bail!(
            "debounce ({debounce}) must be between {MINIMUM_DEBOUNCE} and {MAXIMUM_DEBOUNCE} seconds"
        );
    }

    if let Some(interval) = config.keep_alive_interval
        && !(MINIMUM_KEEP_ALIVE_INTERVAL..=MAXIMUM_KEEP_ALIVE_INTERVAL).contains(&interval)
    {
        bail!(
            "keep_alive_interval ({interval}) must be between {MINIMUM_KEEP_ALIVE_INTERVAL} and {MAXIMUM_KEEP_ALIVE_INTERVAL} seconds"
        );
    }

    if let Some(poll) = config.display_poll_interval
        && !(MINIMUM_DISPLAY_POLL_INTERVAL..=MAXIMUM_DISPLAY_POLL_INTERVAL).contains(&poll)
    {
        bail!(
            "display_poll_interval ({poll} ms) must be between {MINIMUM_DISPLAY_POLL_INTERVAL} and {MAXIMUM_DISPLAY_POLL_INTERVAL} milliseconds"
        );
    }

    if let Some(scan) = config.scan_timeout
        && !(MINIMUM_SCAN_TIMEOUT..=MAXIMUM_SCAN_TIMEOUT).contains(&scan)
    {
        bail!(
            "scan_timeout ({scan}) must be between {MINIMUM_SCAN_TIMEOUT} and {MAXIMUM_SCAN_TIMEOUT} seconds"
        );
    }

    if config.command.as_deref().is_some_and(|c| c.trim().is_empty()) {
        bail!("command must not be empty (remove the setting to dispatch in-process)");
    }

    if config.log_file.as_deref().is_some_and(|l| l.trim().is_empty()) {
        bail!("log_file must not be empty");
    }

    Ok(())
}

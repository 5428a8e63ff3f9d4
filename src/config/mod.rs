//! Configuration system for keylight.
//!
//! The configuration lives in `keylight.toml`, looked up in:
//! 1. the directory passed with `--config DIR`
//! 2. **XDG_CONFIG_HOME**/keylight/keylight.toml
//!
//! A missing default file is generated with every setting spelled out; a
//! missing file in an explicit `--config` directory is an error.
//!
//! ```toml
//! #[Device]
//! # device = "C2A4D1E0-0000-4000-8000-000000000000" # Accessory identifier (omit to scan)
//! scan_timeout = 10                  # Advertisement scan window in seconds (1-120)
//! keep_alive_interval = 6.5          # Resend interval for keep-alive mode in seconds (1-3600)
//!
//! #[Night window]
//! night_start = "17:00"              # Start of the night window (HH:MM or hour)
//! night_end = "07:00"                # End of the night window (HH:MM or hour)
//!
//! #[Triggers]
//! debounce = 4.0                     # Minimum seconds between two events of one kind (0-60)
//! display_poll_interval = 1000       # Display power polling interval in ms (100-10000)
//! trigger_on_display_sleep = true    # Turn the light off when displays power down
//! trigger_on_display_wake = true     # Turn the light on when displays power up at night
//! trigger_on_system_sleep = true     # React to suspend and resume
//! trigger_on_screensaver = false     # React to the session screensaver
//!
//! #[Dispatch]
//! # command = "/usr/bin/keylight"   # External command (omit to drive the radio in-process)
//! # log_file = "~/keylight.log"      # Append log output to this file
//! ```
//!
//! Loading parses the file, validates every present field, then fills the
//! absent ones from `common::constants`. A file that fails validation is
//! rejected as a whole.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use anyhow::Result;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

use crate::ble::DeviceIdentifier;
use crate::ble::session::Target;
use crate::common::constants::*;
use crate::common::utils::{format_seconds, private_path};
use crate::monitor::{MonitorSettings, NightWindow, Triggers};

pub use builder::create_default_config;
pub use loading::{get_config_path, get_custom_config_dir, set_config_dir};
pub use watcher::start_config_watcher;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    pub device: Option<String>,
    #[serde(default, deserialize_with = "hour_or_time")]
    pub night_start: Option<String>,
    #[serde(default, deserialize_with = "hour_or_time")]
    pub night_end: Option<String>,
    pub debounce: Option<f64>,
    pub keep_alive_interval: Option<f64>,
    pub display_poll_interval: Option<u64>, // milliseconds
    pub scan_timeout: Option<u64>,          // seconds
    pub trigger_on_display_sleep: Option<bool>,
    pub trigger_on_display_wake: Option<bool>,
    pub trigger_on_system_sleep: Option<bool>,
    pub trigger_on_screensaver: Option<bool>,
    pub command: Option<String>,
    pub log_file: Option<String>,
}

/// Accept `night_start = 17` as well as `night_start = "17:00"`.
fn hour_or_time<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HourOrTime {
        Hour(i64),
        Text(String),
    }

    Ok(
        Option::<HourOrTime>::deserialize(deserializer)?.map(|value| match value {
            HourOrTime::Hour(hour) => hour.to_string(),
            HourOrTime::Text(text) => text,
        }),
    )
}

impl Config {
    /// Load using the `--config` directory or the XDG default path.
    pub fn load() -> Result<Self> {
        loading::load()
    }

    pub fn get_config_path() -> Result<PathBuf> {
        loading::get_config_path()
    }

    /// Configured accessory, `None` to discover it by scanning.
    pub fn device_id(&self) -> Option<DeviceIdentifier> {
        self.device.as_deref().and_then(|d| d.parse().ok())
    }

    pub fn night_window(&self) -> NightWindow {
        let start = self.night_start.as_deref().unwrap_or(DEFAULT_NIGHT_START);
        let end = self.night_end.as_deref().unwrap_or(DEFAULT_NIGHT_END);
        NightWindow::parse(start, end).unwrap_or_else(|_| NightWindow::default())
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_secs_f64(self.debounce.unwrap_or(DEFAULT_DEBOUNCE))
    }

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs_f64(self.keep_alive_interval.unwrap_or(DEFAULT_KEEP_ALIVE_INTERVAL))
    }

    pub fn display_poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.display_poll_interval
                .unwrap_or(DEFAULT_DISPLAY_POLL_INTERVAL),
        )
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_secs(self.scan_timeout.unwrap_or(DEFAULT_SCAN_TIMEOUT))
    }

    pub fn triggers(&self) -> Triggers {
        Triggers {
            display_sleep: self
                .trigger_on_display_sleep
                .unwrap_or(DEFAULT_TRIGGER_ON_DISPLAY_SLEEP),
            display_wake: self
                .trigger_on_display_wake
                .unwrap_or(DEFAULT_TRIGGER_ON_DISPLAY_WAKE),
            system_sleep: self
                .trigger_on_system_sleep
                .unwrap_or(DEFAULT_TRIGGER_ON_SYSTEM_SLEEP),
            screensaver: self
                .trigger_on_screensaver
                .unwrap_or(DEFAULT_TRIGGER_ON_SCREENSAVER),
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            debounce: self.debounce_interval(),
            triggers: self.triggers(),
        }
    }

    /// Session target for this config, with an optional identifier override
    /// from the command line.
    pub fn target(&self, device_override: Option<DeviceIdentifier>) -> Target {
        Target::new(device_override.or_else(|| self.device_id()), self.scan_window())
    }

    pub fn command_path(&self) -> Option<PathBuf> {
        self.command.as_deref().map(expand_home)
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file.as_deref().map(expand_home)
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        if let Ok(path) = Self::get_config_path() {
            log_indented!("File: {}", private_path(&path));
        }

        match self.device_id() {
            Some(id) => log_indented!("Device: {id}"),
            None => log_indented!("Device: discover by scan ({}s)", self.scan_window().as_secs()),
        }
        log_indented!("Night window: {}", self.night_window());
        log_indented!(
            "Debounce: {}",
            format_seconds(self.debounce_interval().as_secs_f64())
        );

        let triggers = self.triggers();
        let enabled: Vec<&str> = [
            (triggers.display_sleep, "display sleep"),
            (triggers.display_wake, "display wake"),
            (triggers.system_sleep, "system sleep"),
            (triggers.screensaver, "screensaver"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        if enabled.is_empty() {
            log_indented!("Triggers: none");
        } else {
            log_indented!("Triggers: {}", enabled.join(", "));
        }

        match self.command_path() {
            Some(path) => log_indented!("Dispatch: external ({})", private_path(&path)),
            None => log_indented!("Dispatch: in-process"),
        }
    }
}

/// Expand a leading `~/` to the home directory.
pub(crate) fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

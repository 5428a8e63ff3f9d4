//! Fixed protocol values and configuration defaults.

use std::time::Duration;
use uuid::{Uuid, uuid};

// # Accessory protocol

/// GATT service exposing the backlight control characteristic.
pub const LIGHT_SERVICE_UUID: Uuid = uuid!("00010000-0000-1000-8000-011F2000046D");

/// Characteristic that accepts the 8-byte light command.
pub const LIGHT_CHARACTERISTIC_UUID: Uuid = uuid!("00010001-0000-1000-8000-011F2000046D");

/// Advertised name prefixes of the supported keyboards (compared upper-cased).
pub const DEVICE_NAME_PREFIXES: &[&str] = &["MX MCHNCL", "MX MECHANICAL"];

/// Leading bytes shared by every light command.
pub const COMMAND_HEADER: [u8; 2] = [0x0B, 0x1E];
pub const COMMAND_LEN: usize = 8;

// # BLE client timing

pub const DEFAULT_SCAN_TIMEOUT: u64 = 10; // seconds
pub const MINIMUM_SCAN_TIMEOUT: u64 = 1;
pub const MAXIMUM_SCAN_TIMEOUT: u64 = 120;

/// Watchdog applied to each connect/discover/write stage.
pub const STAGE_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the advertisement list is polled while scanning.
pub const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Time left for the accessory's notification after a one-shot write.
pub const NOTIFY_GRACE: Duration = Duration::from_secs(1);

// # Keep-alive

pub const DEFAULT_KEEP_ALIVE_INTERVAL: f64 = 6.5; // seconds
pub const MINIMUM_KEEP_ALIVE_INTERVAL: f64 = 1.0;
pub const MAXIMUM_KEEP_ALIVE_INTERVAL: f64 = 3600.0;

// # Power monitor

pub const DEFAULT_DEBOUNCE: f64 = 4.0; // seconds
pub const MINIMUM_DEBOUNCE: f64 = 0.0;
pub const MAXIMUM_DEBOUNCE: f64 = 60.0;

pub const DEFAULT_DISPLAY_POLL_INTERVAL: u64 = 1000; // milliseconds
pub const MINIMUM_DISPLAY_POLL_INTERVAL: u64 = 100;
pub const MAXIMUM_DISPLAY_POLL_INTERVAL: u64 = 10_000;

pub const DEFAULT_NIGHT_START: &str = "17:00";
pub const DEFAULT_NIGHT_END: &str = "07:00";

pub const DEFAULT_TRIGGER_ON_DISPLAY_SLEEP: bool = true;
pub const DEFAULT_TRIGGER_ON_DISPLAY_WAKE: bool = true;
pub const DEFAULT_TRIGGER_ON_SYSTEM_SLEEP: bool = true;
pub const DEFAULT_TRIGGER_ON_SCREENSAVER: bool = false;

/// Root of the DRM connector tree sampled for display power.
pub const DRM_SYSFS_ROOT: &str = "/sys/class/drm";

// # Process

pub const CONFIG_DIR_NAME: &str = "keylight";
pub const CONFIG_FILE_NAME: &str = "keylight.toml";
pub const LOCK_FILE_NAME: &str = "keylight.lock";

pub const EXIT_FAILURE: i32 = 1;

/// Delay between restarts of a failed D-Bus listener.
pub const LISTENER_RESTART_DELAY: Duration = Duration::from_millis(2000);
pub const MAX_LISTENER_RESTARTS: u8 = 3;

/// Debounce for configuration file change events.
pub const CONFIG_WATCH_DEBOUNCE: Duration = Duration::from_millis(500);

//! Display power sampling from the DRM connector tree.
//!
//! Each connected connector exposes its DPMS state under
//! `/sys/class/drm/card*-*/dpms`. The sample is the highest level across
//! connected outputs, so the display counts as asleep only when every output is
//! off.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::common::constants::DRM_SYSFS_ROOT;
use crate::common::utils::private_path;
use crate::io::signals::SignalMessage;
use crate::monitor::{Monitor, PowerState};

/// Source of display power samples.
pub trait DisplayProbe: Send + 'static {
    fn sample(&self) -> Result<PowerState>;
}

/// Map a DPMS state name to a power level.
pub fn dpms_level(state: &str) -> Option<u8> {
    match state.trim() {
        "On" => Some(3),
        "Standby" => Some(2),
        "Suspend" => Some(1),
        "Off" => Some(0),
        _ => None,
    }
}

pub struct DrmDisplayProbe {
    root: PathBuf,
}

impl DrmDisplayProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn system() -> Self {
        Self::new(DRM_SYSFS_ROOT)
    }

    fn connector_level(path: &Path) -> Option<u8> {
        let status = fs::read_to_string(path.join("status")).ok()?;
        if status.trim() != "connected" {
            return None;
        }
        dpms_level(&fs::read_to_string(path.join("dpms")).ok()?)
    }
}

impl DisplayProbe for DrmDisplayProbe {
    fn sample(&self) -> Result<PowerState> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("cannot read {}", private_path(&self.root)))?;

        let level = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                // Connectors look like card0-HDMI-A-1; bare card0 is the device
                name.starts_with("card") && name.contains('-')
            })
            .filter_map(|entry| Self::connector_level(&entry.path()))
            .max();

        match level {
            Some(level) => Ok(PowerState(level)),
            None => bail!(
                "no connected display connectors under {}",
                private_path(&self.root)
            ),
        }
    }
}

/// Take the initial sample and start polling.
///
/// Returns an error without spawning anything when the first sample cannot be
/// taken; the caller logs it and the display source stays inert.
pub fn start_display_monitor<P: DisplayProbe>(
    probe: P,
    monitor: Arc<Monitor>,
    sender: Sender<SignalMessage>,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    debug_enabled: bool,
) -> Result<()> {
    let initial = probe.sample().context("initial display power sample failed")?;
    monitor.observe_display(initial);

    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            thread::sleep(poll_interval);
            match probe.sample() {
                Ok(sample) => {
                    if let Some(event) = monitor.observe_display(sample)
                        && sender.send(SignalMessage::Power(event, None)).is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    if debug_enabled {
                        log_debug!("Display sample skipped: {e}");
                    }
                }
            }
        }
    });

    Ok(())
}

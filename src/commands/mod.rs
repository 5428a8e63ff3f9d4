//! Command-line command handlers for keylight.
//!
//! One-shot (`--on`/`--off`) and keep-alive modes talk to the accessory
//! directly and exit; monitor mode lives in [`crate::Keylight`].

pub mod keep_alive;
pub mod light;

use anyhow::{Context, Result};
use std::thread;
use tokio::runtime::Runtime;
use tokio::sync::watch;

use crate::ble::DeviceIdentifier;
use crate::ble::session::Target;
use crate::config::Config;
use crate::io::signals::{SignalMessage, SignalState, setup_signal_handler};

/// Load the config for a direct command.
///
/// A broken config file must not stop a manual `--on`/`--off`, so errors fall
/// back to the built-in defaults with a warning.
pub(crate) fn load_config_or_defaults() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log_pipe!();
            log_warning!("Ignoring configuration: {e:#}");
            log_indented!("Using built-in defaults");
            Config::default()
        }
    }
}

/// Parse a `--uuid` value and combine it with the configured target.
pub(crate) fn resolve_target(config: &Config, device: Option<&str>) -> Result<Target> {
    let device = device
        .map(|d| {
            d.parse::<DeviceIdentifier>()
                .with_context(|| format!("Invalid --uuid '{d}' (expected a UUID)"))
        })
        .transpose()?;
    Ok(config.target(device))
}

pub(crate) fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

/// Install the signal handlers and expose shutdown as a `watch` flag.
///
/// The async client cannot block on the mpsc receiver, so a bridge thread
/// flips the flag on the first shutdown signal and lets the client
/// disconnect before the process exits.
pub(crate) fn shutdown_watch(debug_enabled: bool) -> Result<watch::Receiver<bool>> {
    let signal_state = setup_signal_handler(debug_enabled)?;
    Ok(bridge_shutdown(signal_state))
}

fn bridge_shutdown(signal_state: SignalState) -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    thread::spawn(move || {
        // Owning the state keeps a sender alive, so the loop only ends on shutdown
        let SignalState {
            signal_receiver,
            signal_sender: _signal_sender,
            ..
        } = signal_state;
        for message in signal_receiver {
            if matches!(message, SignalMessage::Shutdown) {
                let _ = shutdown_tx.send(true);
                break;
            }
        }
    });
    shutdown_rx
}

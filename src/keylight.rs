//! Application coordinator for monitor mode.
//!
//! Acquires resources in order (log file, config, lock, signals), starts the
//! notification sources, builds the dispatcher and hands everything to
//! [`Core`]. Sources that cannot start are logged and left inert; the monitor
//! keeps running on whatever is left.
//!
//! ```no_run
//! use keylight::Keylight;
//!
//! # fn main() -> anyhow::Result<()> {
//! Keylight::new(false).run()?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::common::constants::EXIT_FAILURE;
use crate::common::logger::{Log, LoggerGuard};
use crate::common::utils::private_path;
use crate::config::{self, Config};
use crate::core::{Core, CoreParams};
use crate::dispatch::Dispatcher;
use crate::io::dbus::{self, Listener};
use crate::io::display::{DrmDisplayProbe, start_display_monitor};
use crate::io::lock;
use crate::io::signals::setup_signal_handler;
use crate::monitor::Monitor;

pub struct Keylight {
    debug_enabled: bool,
    log_file: Option<PathBuf>,
}

impl Keylight {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            log_file: None,
        }
    }

    /// Append log output to `path` (overrides the config's `log_file`).
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    pub fn run(self) -> Result<()> {
        log_version!();
        Log::set_timestamps(true);

        let mut _log_guard: Option<LoggerGuard> = self
            .log_file
            .clone()
            .map(Log::start_file_logging)
            .transpose()
            .context("Failed to open log file")?;

        let config = Config::load()?;

        if _log_guard.is_none()
            && let Some(path) = config.log_file_path()
        {
            _log_guard = Some(Log::start_file_logging(path.clone()).with_context(|| {
                format!("Failed to open log file {}", private_path(&path))
            })?);
        }

        config.log_config();

        let Some(lock) = lock::acquire_lock(&lock::lock_path())? else {
            log_end!();
            std::process::exit(EXIT_FAILURE);
        };

        let signal_state = setup_signal_handler(self.debug_enabled)?;
        let monitor = Arc::new(Monitor::new(config.monitor_settings(), self.debug_enabled));

        self.start_sources(&config, &monitor, &signal_state);

        if let Err(e) =
            config::start_config_watcher(signal_state.signal_sender.clone(), self.debug_enabled)
        {
            log_pipe!();
            log_warning!("Config hot reload unavailable: {e:#}");
            log_indented!("Send SIGUSR2 to reload manually");
        }

        let dispatcher = Dispatcher::from_config(&config, self.debug_enabled)
            .context("Failed to prepare light dispatch")?;

        Core::new(CoreParams {
            config,
            signal_state,
            monitor,
            dispatcher,
            debug_enabled: self.debug_enabled,
            lock: Some(lock),
        })
        .execute()?;

        log_end!();
        Ok(())
    }

    fn start_sources(
        &self,
        config: &Config,
        monitor: &Arc<Monitor>,
        signal_state: &crate::io::signals::SignalState,
    ) {
        if let Err(e) = start_display_monitor(
            DrmDisplayProbe::system(),
            Arc::clone(monitor),
            signal_state.signal_sender.clone(),
            Arc::clone(&signal_state.running),
            config.display_poll_interval(),
            self.debug_enabled,
        ) {
            log_pipe!();
            log_warning!("Display power source unavailable: {e:#}");
            log_indented!("Display transitions will not be observed");
        }

        dbus::start_listener(
            Listener::SystemSleep,
            Arc::clone(monitor),
            signal_state.signal_sender.clone(),
            self.debug_enabled,
        );

        if config.triggers().screensaver {
            dbus::start_listener(
                Listener::Screensaver,
                Arc::clone(monitor),
                signal_state.signal_sender.clone(),
                self.debug_enabled,
            );
        }
    }
}

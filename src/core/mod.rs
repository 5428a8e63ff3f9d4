//! Core event loop.
//!
//! `Core` owns the dispatcher and the single consumer end of the message
//! channel. Notification sources run on their own threads and only ever hand
//! it debounced [`PowerEvent`]s, so dispatch is strictly sequential: one
//! command finishes (or fails) before the next event is looked at.
//!
//! - `Power` → night-window decision and dispatch
//! - `Reload` → re-read the config; keep the old one if the new one is invalid
//! - `Shutdown` → release the dispatcher and the lock

use anyhow::Result;
use chrono::{Local, NaiveTime};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::common::utils::private_path;
use crate::config::{self, Config};
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::io::lock::LockFile;
use crate::io::signals::{SignalMessage, SignalState};
use crate::monitor::{Monitor, PowerEvent};

/// How often the loop wakes up to check the running flag without a message.
const LOOP_TICK: Duration = Duration::from_secs(1);

/// Dependencies for a [`Core`], bundled to keep `new` readable.
pub(crate) struct CoreParams {
    pub config: Config,
    pub signal_state: SignalState,
    pub monitor: Arc<Monitor>,
    pub dispatcher: Dispatcher,
    pub debug_enabled: bool,
    pub lock: Option<LockFile>,
}

pub(crate) struct Core {
    config: Config,
    signal_state: SignalState,
    monitor: Arc<Monitor>,
    dispatcher: Dispatcher,
    debug_enabled: bool,
    // Released when the core is dropped
    _lock: Option<LockFile>,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        Self {
            config: params.config,
            signal_state: params.signal_state,
            monitor: params.monitor,
            dispatcher: params.dispatcher,
            debug_enabled: params.debug_enabled,
            _lock: params.lock,
        }
    }

    /// Run until a shutdown signal arrives or every producer is gone.
    pub fn execute(mut self) -> Result<()> {
        if let Some(custom_dir) = config::get_custom_config_dir() {
            log_block_start!("Base directory: {}", private_path(&custom_dir));
        }

        log_block_start!("Monitoring power transitions");
        log_indented!("Night window: {}", self.dispatcher.window());
        log_indented!("Dispatching via {}", self.dispatcher.describe());

        self.main_loop();

        self.dispatcher.shutdown();
        log_block_start!("Released light session");
        Ok(())
    }

    fn main_loop(&mut self) {
        while self.signal_state.running.load(Ordering::SeqCst) {
            match self.signal_state.signal_receiver.recv_timeout(LOOP_TICK) {
                Ok(SignalMessage::Power(event, hold)) => {
                    self.handle_event(&event, Local::now().time());
                    // Suspend may proceed once the command has finished
                    drop(hold);
                }
                Ok(SignalMessage::Reload) => self.handle_config_reload(Config::load()),
                Ok(SignalMessage::Shutdown) => break,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if self.debug_enabled {
                        log_pipe!();
                        log_debug!("Message channel closed, leaving event loop");
                    }
                    break;
                }
            }
        }
    }

    fn handle_event(&mut self, event: &PowerEvent, now: NaiveTime) -> DispatchOutcome {
        let outcome = self.dispatcher.handle(event, now);
        if self.debug_enabled {
            log_debug!("Dispatch outcome: {outcome:?}");
        }
        outcome
    }

    /// Swap in a freshly loaded config.
    ///
    /// Window, debounce, triggers and dispatch strategy take effect at once.
    /// Sources keep running as started: their set and the display poll
    /// interval only change on restart.
    fn handle_config_reload(&mut self, loaded: Result<Config>) {
        let new_config = match loaded {
            Ok(config) => config,
            Err(e) => {
                log_pipe!();
                log_error!("Configuration reload failed: {e:#}");
                log_indented!("Keeping the previous configuration");
                return;
            }
        };

        if new_config == self.config {
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Configuration unchanged, nothing to reload");
            }
            return;
        }

        let dispatcher = match Dispatcher::from_config(&new_config, self.debug_enabled) {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                log_pipe!();
                log_error!("Could not prepare dispatcher for new configuration: {e}");
                log_indented!("Keeping the previous configuration");
                return;
            }
        };

        self.dispatcher.shutdown();
        self.dispatcher = dispatcher;
        self.monitor.reconfigure(new_config.monitor_settings());

        new_config.log_config();
        if new_config.display_poll_interval != self.config.display_poll_interval
            || new_config.triggers() != self.config.triggers()
        {
            log_indented!("Source changes apply after restart");
        }

        self.config = new_config;
    }
}

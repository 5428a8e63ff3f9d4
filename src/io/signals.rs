//! Unix signal handling and the core message channel.
//!
//! Every producer (signal thread, notification sources, config watcher) sends a
//! [`SignalMessage`] over one mpsc channel; the core event loop is the single
//! consumer.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR2},
    iterator::Signals,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread;

use crate::monitor::PowerEvent;

#[derive(Debug)]
pub enum SignalMessage {
    /// Re-read the configuration (SIGUSR2 or file change)
    Reload,
    /// Graceful shutdown (SIGINT, SIGTERM, SIGHUP)
    Shutdown,
    /// Debounced power transition accepted by the monitor, with anything that
    /// must stay held until it has been dispatched
    Power(PowerEvent, Option<EventHold>),
}

/// Resource released once the event it travels with has been dispatched,
/// such as a logind sleep delay lock.
pub struct EventHold(Box<dyn Send>);

impl EventHold {
    pub fn new<T: Send + 'static>(guard: T) -> Self {
        Self(Box::new(guard))
    }
}

impl fmt::Debug for EventHold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHold")
    }
}

pub struct SignalState {
    /// Cleared once a shutdown signal has been received
    pub running: Arc<AtomicBool>,
    pub signal_receiver: Receiver<SignalMessage>,
    /// Cloned into every producer thread
    pub signal_sender: Sender<SignalMessage>,
}

/// Register signal handlers and spawn the thread that forwards them.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = channel::<SignalMessage>();

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP, SIGUSR2])
        .context("failed to register signal handlers")?;

    let running_clone = running.clone();
    let sender = signal_sender.clone();

    thread::spawn(move || {
        for sig in signals.forever() {
            let message = match sig {
                SIGUSR2 => {
                    log_pipe!();
                    log_info!("Received configuration reload signal");
                    SignalMessage::Reload
                }
                _ => {
                    let reason = match sig {
                        SIGINT if debug_enabled => "Received SIGINT (Ctrl+C)",
                        SIGINT => "Received interrupt signal",
                        SIGTERM => "Received termination request",
                        _ => "Terminal hung up",
                    };
                    log_pipe!();
                    log_info!("{reason}, shutting down...");
                    running_clone.store(false, Ordering::SeqCst);
                    SignalMessage::Shutdown
                }
            };

            if sender.send(message).is_err() {
                // Main loop already gone
                running_clone.store(false, Ordering::SeqCst);
                break;
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}

//! D-Bus notification sources.
//!
//! - systemd-logind `PrepareForSleep` on the system bus (whole-machine sleep)
//! - `org.freedesktop.ScreenSaver.ActiveChanged` on the session bus
//!
//! Both use zbus's blocking API on dedicated threads and route transitions
//! through the shared [`Monitor`]. The sleep listener keeps a logind "delay"
//! inhibitor while the machine is awake and hands it over with the sleep
//! event, so suspend waits until the Off command has been dispatched. A listener whose connection fails is
//! restarted a few times; after that the source is logged as unavailable and
//! the process carries on without it.

use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use zbus::blocking::Connection;
use zbus::zvariant::OwnedFd;

use crate::common::constants::{LISTENER_RESTART_DELAY, MAX_LISTENER_RESTARTS};
use crate::io::signals::{EventHold, SignalMessage};
use crate::monitor::{EventKind, EventSource, Monitor};

#[zbus::proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1"
)]
trait LogindManager {
    /// Take an inhibitor lock; it is released when the returned fd is closed.
    fn inhibit(&self, what: &str, who: &str, why: &str, mode: &str) -> zbus::Result<OwnedFd>;

    /// `true` before suspend, `false` after resume.
    #[zbus(signal)]
    fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.ScreenSaver",
    default_service = "org.freedesktop.ScreenSaver",
    default_path = "/org/freedesktop/ScreenSaver"
)]
trait ScreenSaver {
    #[zbus(signal)]
    fn active_changed(&self, active: bool) -> zbus::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    SystemSleep,
    Screensaver,
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Listener::SystemSleep => f.write_str("System sleep"),
            Listener::Screensaver => f.write_str("Screensaver"),
        }
    }
}

/// Map a boolean "entering" flag from either signal to an event kind.
pub fn transition_kind(entering: bool) -> EventKind {
    if entering {
        EventKind::SleepLike
    } else {
        EventKind::WakeLike
    }
}

/// Spawn a listener thread with restart on failure.
pub fn start_listener(
    listener: Listener,
    monitor: Arc<Monitor>,
    sender: Sender<SignalMessage>,
    debug_enabled: bool,
) {
    thread::spawn(move || {
        let mut restarts: u8 = 0;
        loop {
            let result = match listener {
                Listener::SystemSleep => listen_system_sleep(&monitor, &sender, debug_enabled),
                Listener::Screensaver => listen_screensaver(&monitor, &sender, debug_enabled),
            };

            match result {
                Ok(()) => {
                    if debug_enabled {
                        log_pipe!();
                        log_debug!("{listener} listener exiting normally");
                    }
                    return;
                }
                Err(e) => {
                    log_pipe!();
                    log_warning!("{listener} listener error: {e:#}");
                    if restarts >= MAX_LISTENER_RESTARTS {
                        log_indented!("Maximum restart attempts reached");
                        log_indented!("{listener} transitions will not be observed");
                        return;
                    }
                    restarts += 1;
                    log_indented!(
                        "Restarting listener (attempt {restarts}/{MAX_LISTENER_RESTARTS})"
                    );
                    thread::sleep(LISTENER_RESTART_DELAY);
                }
            }
        }
    });
}

/// Hand a transition to the monitor and forward it if accepted.
///
/// `hold` goes out with the event; a suppressed event releases it at once.
/// Returns `false` once the core channel is closed.
fn forward(
    monitor: &Monitor,
    sender: &Sender<SignalMessage>,
    kind: EventKind,
    source: EventSource,
    hold: Option<EventHold>,
) -> bool {
    match monitor.observe_transition(kind, source) {
        Some(event) => sender.send(SignalMessage::Power(event, hold)).is_ok(),
        None => true,
    }
}

/// Delay suspend until the fd is closed (bounded by logind's `InhibitDelayMaxSec`).
fn take_sleep_delay(
    proxy: &LogindManagerProxyBlocking<'_>,
    debug_enabled: bool,
) -> Option<OwnedFd> {
    match proxy.inhibit("sleep", "keylight", "Turning the keyboard light off", "delay") {
        Ok(fd) => {
            if debug_enabled {
                log_debug!("Holding logind sleep delay lock");
            }
            Some(fd)
        }
        Err(e) => {
            log_pipe!();
            log_warning!("Could not take a sleep delay lock: {e}");
            log_indented!("The light may stay on if suspend is faster than the radio");
            None
        }
    }
}

fn listen_system_sleep(
    monitor: &Monitor,
    sender: &Sender<SignalMessage>,
    debug_enabled: bool,
) -> Result<()> {
    let connection = Connection::system().context("Failed to connect to system D-Bus")?;
    let proxy =
        LogindManagerProxyBlocking::new(&connection).context("Failed to create logind proxy")?;
    let signals = proxy
        .receive_prepare_for_sleep()
        .context("Failed to subscribe to PrepareForSleep signals")?;

    if debug_enabled {
        log_debug!("Subscribed to systemd-logind PrepareForSleep signals");
    }

    let mut delay = take_sleep_delay(&proxy, debug_enabled);

    for signal in signals {
        match signal.args() {
            Ok(args) => {
                let hold = if args.start {
                    delay.take().map(EventHold::new)
                } else {
                    // Re-arm for the next suspend
                    if delay.is_none() {
                        delay = take_sleep_delay(&proxy, debug_enabled);
                    }
                    None
                };
                if !forward(
                    monitor,
                    sender,
                    transition_kind(args.start),
                    EventSource::System,
                    hold,
                ) {
                    return Ok(());
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse PrepareForSleep signal args: {e}");
            }
        }
    }

    anyhow::bail!("D-Bus connection lost - PrepareForSleep signal stream ended")
}

fn listen_screensaver(
    monitor: &Monitor,
    sender: &Sender<SignalMessage>,
    debug_enabled: bool,
) -> Result<()> {
    let connection = Connection::session().context("Failed to connect to session D-Bus")?;
    let proxy = ScreenSaverProxyBlocking::new(&connection)
        .context("Failed to create ScreenSaver proxy")?;
    let signals = proxy
        .receive_active_changed()
        .context("Failed to subscribe to ScreenSaver ActiveChanged signals")?;

    if debug_enabled {
        log_debug!("Subscribed to ScreenSaver ActiveChanged signals");
    }

    for signal in signals {
        match signal.args() {
            Ok(args) => {
                if !forward(
                    monitor,
                    sender,
                    transition_kind(args.active),
                    EventSource::Screensaver,
                    None,
                ) {
                    return Ok(());
                }
            }
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to parse ActiveChanged signal args: {e}");
            }
        }
    }

    anyhow::bail!("D-Bus connection lost - ActiveChanged signal stream ended")
}

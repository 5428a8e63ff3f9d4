//! Command Dispatcher.
//!
//! Maps an accepted power event and the night window to a light command and
//! executes it through a [`LightSwitch`]. Failures are logged and reported as
//! [`DispatchOutcome::Failed`]; they never propagate to the event loop.

pub mod external;
pub mod in_process;

use chrono::NaiveTime;
use thiserror::Error;

use crate::ble::{ClientError, LightCommand};
use crate::config::Config;
use crate::monitor::{EventKind, NightWindow, PowerEvent};

pub use external::ExternalCommand;
pub use in_process::InProcessSwitch;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    ExitStatus {
        command: String,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("async runtime unavailable: {0}")]
    Runtime(String),
}

/// Strategy that actually changes the light.
#[cfg_attr(test, mockall::automock)]
pub trait LightSwitch: Send {
    fn set(&mut self, command: LightCommand) -> Result<(), DispatchError>;

    /// Label used in logs.
    fn describe(&self) -> String;

    /// Release held resources before exit.
    fn shutdown(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent(LightCommand),
    /// Wake outside the night window.
    Skipped,
    Failed(LightCommand),
}

/// Sleep always turns the light off; wake turns it on only inside the window.
pub fn decide(kind: EventKind, in_window: bool) -> Option<LightCommand> {
    match kind {
        EventKind::SleepLike => Some(LightCommand::Off),
        EventKind::WakeLike if in_window => Some(LightCommand::On),
        EventKind::WakeLike => None,
    }
}

pub struct Dispatcher {
    switch: Box<dyn LightSwitch>,
    window: NightWindow,
}

impl Dispatcher {
    pub fn new(switch: Box<dyn LightSwitch>, window: NightWindow) -> Self {
        Self { switch, window }
    }

    /// The external command when one is configured, the in-process BLE
    /// client otherwise.
    pub fn from_config(config: &Config, debug_enabled: bool) -> Result<Self, DispatchError> {
        let switch: Box<dyn LightSwitch> = match config.command_path() {
            Some(program) => Box::new(ExternalCommand::new(program, config.device_id())),
            None => Box::new(InProcessSwitch::new(config.target(None), debug_enabled)?),
        };
        Ok(Self::new(switch, config.night_window()))
    }

    pub fn window(&self) -> NightWindow {
        self.window
    }

    pub fn describe(&self) -> String {
        self.switch.describe()
    }

    /// Handle one accepted event at wall-clock time `now`.
    pub fn handle(&mut self, event: &PowerEvent, now: NaiveTime) -> DispatchOutcome {
        // Only wake events consult the window
        let in_window = event.kind == EventKind::WakeLike && self.window.contains(now);
        let Some(command) = decide(event.kind, in_window) else {
            log_indented!(
                "Wake at {} is outside night window {}: leaving light unchanged",
                now.format("%H:%M"),
                self.window
            );
            return DispatchOutcome::Skipped;
        };

        match event.kind {
            EventKind::SleepLike => log_decorated!("Turning light off ({event})"),
            EventKind::WakeLike => log_decorated!(
                "Wake at {} inside night window {}: turning light on",
                now.format("%H:%M"),
                self.window
            ),
        }

        match self.switch.set(command) {
            Ok(()) => DispatchOutcome::Sent(command),
            Err(e) => {
                log_pipe!();
                log_error!("Light {command} via {} failed: {e}", self.switch.describe());
                if let DispatchError::ExitStatus { stderr, .. } = &e {
                    for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                        log_indented!("stderr: {line}");
                    }
                }
                log_indented!("Continuing to monitor");
                DispatchOutcome::Failed(command)
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.switch.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::EventSource;
    use mockall::predicate::eq;
    use std::time::Instant;

    fn event(kind: EventKind) -> PowerEvent {
        PowerEvent {
            kind,
            source: EventSource::Display,
            at: Instant::now(),
        }
    }

    fn at(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    fn dispatcher(switch: MockLightSwitch) -> Dispatcher {
        crate::common::logger::Log::set_enabled(false);
        Dispatcher::new(Box::new(switch), NightWindow::from_hours(17, 7).unwrap())
    }

    #[test]
    fn test_decide_table() {
        assert_eq!(decide(EventKind::SleepLike, false), Some(LightCommand::Off));
        assert_eq!(decide(EventKind::SleepLike, true), Some(LightCommand::Off));
        assert_eq!(decide(EventKind::WakeLike, true), Some(LightCommand::On));
        assert_eq!(decide(EventKind::WakeLike, false), None);
    }

    #[test]
    fn test_wake_at_night_turns_on() {
        let mut switch = MockLightSwitch::new();
        switch
            .expect_set()
            .with(eq(LightCommand::On))
            .times(1)
            .returning(|_| Ok(()));
        let mut dispatcher = dispatcher(switch);
        let outcome = dispatcher.handle(&event(EventKind::WakeLike), at(3));
        assert_eq!(outcome, DispatchOutcome::Sent(LightCommand::On));
    }

    #[test]
    fn test_wake_during_day_is_noop() {
        let mut switch = MockLightSwitch::new();
        switch.expect_set().never();
        let mut dispatcher = dispatcher(switch);
        let outcome = dispatcher.handle(&event(EventKind::WakeLike), at(10));
        assert_eq!(outcome, DispatchOutcome::Skipped);
    }

    #[test]
    fn test_sleep_turns_off_regardless_of_window() {
        let mut switch = MockLightSwitch::new();
        switch
            .expect_set()
            .with(eq(LightCommand::Off))
            .times(2)
            .returning(|_| Ok(()));
        let mut dispatcher = dispatcher(switch);
        assert_eq!(
            dispatcher.handle(&event(EventKind::SleepLike), at(10)),
            DispatchOutcome::Sent(LightCommand::Off)
        );
        assert_eq!(
            dispatcher.handle(&event(EventKind::SleepLike), at(23)),
            DispatchOutcome::Sent(LightCommand::Off)
        );
    }

    #[test]
    fn test_failure_is_contained_and_next_event_still_handled() {
        let mut switch = MockLightSwitch::new();
        let mut calls = 0;
        switch.expect_set().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(DispatchError::Client(ClientError::Protocol {
                    stage: crate::ble::Stage::Writing,
                    source: btleplug::Error::NotConnected,
                }))
            } else {
                Ok(())
            }
        });
        switch
            .expect_describe()
            .returning(|| "in-process BLE client".to_string());
        let mut dispatcher = dispatcher(switch);

        assert_eq!(
            dispatcher.handle(&event(EventKind::SleepLike), at(23)),
            DispatchOutcome::Failed(LightCommand::Off)
        );
        assert_eq!(
            dispatcher.handle(&event(EventKind::WakeLike), at(23)),
            DispatchOutcome::Sent(LightCommand::On)
        );
    }

    #[test]
    fn test_shutdown_reaches_switch() {
        let mut switch = MockLightSwitch::new();
        switch.expect_shutdown().times(1).return_const(());
        let mut dispatcher = dispatcher(switch);
        dispatcher.shutdown();
    }
}

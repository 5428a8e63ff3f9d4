//! Power Transition Monitor.
//!
//! All notification sources (display power polling, logind sleep, screensaver)
//! feed one `Monitor`. It keeps the last display sample and the debounce
//! ledger behind a single mutex, so concurrent callbacks from different source
//! threads see one consistent ledger per event kind.
//!
//! Pipeline for each observation:
//! 1. Display samples are classified against the previous sample; the first
//!    sample is recorded only.
//! 2. Events from sources whose trigger is disabled are dropped.
//! 3. The per-kind debounce ledger accepts or suppresses the event.

pub mod debounce;
pub mod night_window;
pub mod power;

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub use debounce::{Admission, DebounceLedger};
pub use night_window::NightWindow;
pub use power::{EventKind, EventSource, PowerEvent, PowerState, classify};

/// Which transitions are honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triggers {
    pub display_sleep: bool,
    pub display_wake: bool,
    pub system_sleep: bool,
    pub screensaver: bool,
}

impl Default for Triggers {
    fn default() -> Self {
        use crate::common::constants::*;
        Self {
            display_sleep: DEFAULT_TRIGGER_ON_DISPLAY_SLEEP,
            display_wake: DEFAULT_TRIGGER_ON_DISPLAY_WAKE,
            system_sleep: DEFAULT_TRIGGER_ON_SYSTEM_SLEEP,
            screensaver: DEFAULT_TRIGGER_ON_SCREENSAVER,
        }
    }
}

impl Triggers {
    pub fn allows(&self, kind: EventKind, source: EventSource) -> bool {
        match (source, kind) {
            (EventSource::Display, EventKind::SleepLike) => self.display_sleep,
            (EventSource::Display, EventKind::WakeLike) => self.display_wake,
            (EventSource::System, _) => self.system_sleep,
            (EventSource::Screensaver, _) => self.screensaver,
        }
    }
}

/// Tunables that may change on config reload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    pub debounce: Duration,
    pub triggers: Triggers,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs_f64(crate::common::constants::DEFAULT_DEBOUNCE),
            triggers: Triggers::default(),
        }
    }
}

struct MonitorState {
    last_display: Option<PowerState>,
    ledger: DebounceLedger,
    settings: MonitorSettings,
}

pub struct Monitor {
    state: Mutex<MonitorState>,
    debug_enabled: bool,
}

impl Monitor {
    pub fn new(settings: MonitorSettings, debug_enabled: bool) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                last_display: None,
                ledger: DebounceLedger::new(),
                settings,
            }),
            debug_enabled,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // A panicking source thread must not take the monitor down with it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace debounce interval and triggers. The ledger and last sample are kept.
    pub fn reconfigure(&self, settings: MonitorSettings) {
        self.lock().settings = settings;
    }

    pub fn settings(&self) -> MonitorSettings {
        self.lock().settings
    }

    pub fn last_display_sample(&self) -> Option<PowerState> {
        self.lock().last_display
    }

    pub fn observe_display(&self, sample: PowerState) -> Option<PowerEvent> {
        self.observe_display_at(sample, Instant::now())
    }

    /// Record a display sample and return an accepted event, if any.
    pub fn observe_display_at(&self, sample: PowerState, now: Instant) -> Option<PowerEvent> {
        let mut state = self.lock();
        let previous = state.last_display.replace(sample);

        let Some(kind) = classify(previous, sample) else {
            if previous.is_none() {
                log_block_start!("Initial display state: {sample}");
            } else if self.debug_enabled && previous != Some(sample) {
                log_debug!("Display level {sample}, no transition");
            }
            return None;
        };

        log_block_start!("Display transition: {} → {sample}", previous.unwrap_or(sample));
        self.admit(&mut state, kind, EventSource::Display, now)
    }

    pub fn observe_transition(&self, kind: EventKind, source: EventSource) -> Option<PowerEvent> {
        self.observe_transition_at(kind, source, Instant::now())
    }

    /// Route an already-classified transition (system sleep, screensaver)
    /// through the shared trigger filter and ledger.
    pub fn observe_transition_at(
        &self,
        kind: EventKind,
        source: EventSource,
        now: Instant,
    ) -> Option<PowerEvent> {
        let mut state = self.lock();
        log_block_start!("{source} {kind} notification");
        self.admit(&mut state, kind, source, now)
    }

    fn admit(
        &self,
        state: &mut MonitorState,
        kind: EventKind,
        source: EventSource,
        now: Instant,
    ) -> Option<PowerEvent> {
        if !state.settings.triggers.allows(kind, source) {
            log_indented!("Ignored: {source} {kind} trigger is disabled");
            return None;
        }

        let debounce = state.settings.debounce;
        match state.ledger.admit(kind, now, debounce) {
            Admission::Accepted => Some(PowerEvent {
                kind,
                source,
                at: now,
            }),
            Admission::Suppressed { since_last } => {
                log_indented!(
                    "Debounced: previous {kind} event {:.1}s ago (< {:.1}s)",
                    since_last.as_secs_f64(),
                    debounce.as_secs_f64()
                );
                None
            }
        }
    }
}

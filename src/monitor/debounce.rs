//! Per-kind debounce ledger.

use std::time::{Duration, Instant};

use super::power::EventKind;

/// Result of offering an event to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Same-kind event already accepted `since_last` ago.
    Suppressed { since_last: Duration },
}

/// Last accepted time for each event kind. Kinds never suppress each other.
#[derive(Debug, Default, Clone)]
pub struct DebounceLedger {
    last_sleep: Option<Instant>,
    last_wake: Option<Instant>,
}

impl DebounceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the event and stamp its kind, unless the previous event of the
    /// same kind was accepted less than `interval` before `now`.
    pub fn admit(&mut self, kind: EventKind, now: Instant, interval: Duration) -> Admission {
        let slot = match kind {
            EventKind::SleepLike => &mut self.last_sleep,
            EventKind::WakeLike => &mut self.last_wake,
        };
        if let Some(last) = *slot {
            let since_last = now.saturating_duration_since(last);
            if since_last < interval {
                return Admission::Suppressed { since_last };
            }
        }
        *slot = Some(now);
        Admission::Accepted
    }

    pub fn last_accepted(&self, kind: EventKind) -> Option<Instant> {
        match kind {
            EventKind::SleepLike => self.last_sleep,
            EventKind::WakeLike => self.last_wake,
        }
    }
}

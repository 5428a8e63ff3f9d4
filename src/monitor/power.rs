//! Power samples and transition classification.

use std::fmt;
use std::time::Instant;

/// Sampled display power level. Only "asleep" (level 0) versus "awake"
/// (anything higher) matters for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PowerState(pub u8);

impl PowerState {
    pub const ASLEEP: PowerState = PowerState(0);

    pub fn is_awake(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bucket = if self.is_awake() { "awake" } else { "asleep" };
        write!(f, "{bucket} (level {})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SleepLike,
    WakeLike,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::SleepLike => f.write_str("sleep"),
            EventKind::WakeLike => f.write_str("wake"),
        }
    }
}

/// Notification source an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    Display,
    System,
    Screensaver,
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSource::Display => f.write_str("display"),
            EventSource::System => f.write_str("system"),
            EventSource::Screensaver => f.write_str("screensaver"),
        }
    }
}

/// A classified, debounced transition ready for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerEvent {
    pub kind: EventKind,
    pub source: EventSource,
    pub at: Instant,
}

impl fmt::Display for PowerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source, self.kind)
    }
}

/// Classify a new sample against the previous one.
///
/// The first observation and unchanged buckets yield no event.
pub fn classify(previous: Option<PowerState>, current: PowerState) -> Option<EventKind> {
    match (previous?.is_awake(), current.is_awake()) {
        (true, false) => Some(EventKind::SleepLike),
        (false, true) => Some(EventKind::WakeLike),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_is_not_an_event() {
        assert_eq!(classify(None, PowerState(0)), None);
        assert_eq!(classify(None, PowerState(4)), None);
    }

    #[test]
    fn test_bucket_changes() {
        assert_eq!(classify(Some(PowerState(4)), PowerState(0)), Some(EventKind::SleepLike));
        assert_eq!(classify(Some(PowerState(0)), PowerState(1)), Some(EventKind::WakeLike));
    }

    #[test]
    fn test_level_change_within_bucket_is_ignored() {
        assert_eq!(classify(Some(PowerState(4)), PowerState(2)), None);
        assert_eq!(classify(Some(PowerState(0)), PowerState(0)), None);
    }
}

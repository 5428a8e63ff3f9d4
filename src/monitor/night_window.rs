//! Night-window predicate.
//!
//! A window is a pair of minute-of-day bounds. When `start > end` it spans
//! midnight (`17:00-07:00` covers the evening and early morning); otherwise it
//! is a same-day range. The start is inclusive, the end exclusive.

use anyhow::{Result, bail};
use chrono::{NaiveTime, Timelike};
use std::fmt;

const MINUTES_PER_DAY: u16 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    start: u16,
    end: u16,
}

impl NightWindow {
    /// Build from minute-of-day bounds. Returns `None` if either bound is not
    /// within a day. Equal bounds give an empty window.
    pub fn from_minutes(start: u16, end: u16) -> Option<Self> {
        (start < MINUTES_PER_DAY && end < MINUTES_PER_DAY).then_some(Self { start, end })
    }

    /// Build from whole hours (0-23).
    pub fn from_hours(start: u32, end: u32) -> Option<Self> {
        if start >= 24 || end >= 24 {
            return None;
        }
        Self::from_minutes((start * 60) as u16, (end * 60) as u16)
    }

    /// Parse both bounds from `"HH:MM"` or bare-hour strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let Some(start_min) = parse_time_of_day(start) else {
            bail!("night_start '{start}' is not a valid time (expected HH:MM or an hour 0-23)");
        };
        let Some(end_min) = parse_time_of_day(end) else {
            bail!("night_end '{end}' is not a valid time (expected HH:MM or an hour 0-23)");
        };
        Ok(Self {
            start: start_min,
            end: end_min,
        })
    }

    pub fn start_minute(&self) -> u16 {
        self.start
    }

    pub fn end_minute(&self) -> u16 {
        self.end
    }

    pub fn spans_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `now` falls inside the window.
    pub fn contains(&self, now: NaiveTime) -> bool {
        self.contains_minute((now.hour() * 60 + now.minute()) as u16)
    }

    pub fn contains_minute(&self, minute: u16) -> bool {
        if self.spans_midnight() {
            minute >= self.start || minute < self.end
        } else {
            minute >= self.start && minute < self.end
        }
    }

    /// Hour-granularity check, equivalent to `contains` at `hh:00`.
    pub fn contains_hour(&self, hour: u32) -> bool {
        hour < 24 && self.contains_minute((hour * 60) as u16)
    }
}

/// 17:00-07:00
impl Default for NightWindow {
    fn default() -> Self {
        Self {
            start: 17 * 60,
            end: 7 * 60,
        }
    }
}

impl fmt::Display for NightWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}-{:02}:{:02}",
            self.start / 60,
            self.start % 60,
            self.end / 60,
            self.end % 60
        )
    }
}

/// Parse `"HH:MM"` (hour < 24, minute < 60) or a bare hour into minute-of-day.
pub fn parse_time_of_day(value: &str) -> Option<u16> {
    let value = value.trim();
    let (hour, minute) = match value.split_once(':') {
        Some((h, m)) => (h.trim().parse::<u16>().ok()?, m.trim().parse::<u16>().ok()?),
        None => (value.parse::<u16>().ok()?, 0),
    };
    if hour >= 24 || minute >= 60 {
        return None;
    }
    Some(hour * 60 + minute)
}

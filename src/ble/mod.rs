//! Command Protocol Client for the keyboard backlight.
//!
//! The client owns at most one BLE session at a time and walks it through an
//! explicit stage sequence:
//!
//! ```text
//! Idle → Connecting → ServiceDiscovery → CharacteristicDiscovery → Writing → Done
//!                 ╰────────────────────────── any error ────────────────────╯→ Failed
//! ```
//!
//! - [`command`] encodes the fixed 8-byte payload.
//! - [`radio`] abstracts the host BLE stack behind the `Radio`/`Link` traits and
//!   provides the `btleplug` implementation.
//! - [`session`] runs the stage machine and yields a `CommandChannel`, the only
//!   handle through which a payload can be written.
//! - [`client`] serializes requests and implements one-shot and keep-alive modes.

pub mod client;
pub mod command;
pub mod error;
pub mod radio;
pub mod session;

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use client::LightClient;
pub use command::LightCommand;
pub use error::ClientError;
pub use radio::{BtleRadio, Link, Radio, ScanMatcher};
pub use session::{Cancel, Stage};

/// 128-bit identifier of the bonded accessory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentifier(Uuid);

impl DeviceIdentifier {
    /// Whether a platform peripheral id refers to this device.
    ///
    /// Platform ids are rendered differently per backend, so the comparison is
    /// done on the hyphenated and simple forms, ignoring case.
    pub fn matches(&self, platform_id: &str) -> bool {
        let platform_id = platform_id.to_ascii_lowercase();
        let hyphenated = self.0.hyphenated().to_string();
        let simple = self.0.simple().to_string();
        platform_id.contains(&hyphenated) || platform_id.contains(&simple)
    }
}

impl FromStr for DeviceIdentifier {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated().to_string().to_uppercase())
    }
}

//! Light command payload.

use crate::common::constants::{COMMAND_HEADER, COMMAND_LEN};
use std::fmt;

/// Desired backlight state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightCommand {
    On,
    Off,
}

impl LightCommand {
    /// Encode as `0B 1E <state> 00 00 00 00 00`.
    pub fn encode(self) -> [u8; COMMAND_LEN] {
        let mut payload = [0u8; COMMAND_LEN];
        payload[..COMMAND_HEADER.len()].copy_from_slice(&COMMAND_HEADER);
        payload[2] = match self {
            LightCommand::On => 0x01,
            LightCommand::Off => 0x00,
        };
        payload
    }

    /// Command-line flag used when dispatching through an external program.
    pub fn as_flag(self) -> &'static str {
        match self {
            LightCommand::On => "--on",
            LightCommand::Off => "--off",
        }
    }
}

impl fmt::Display for LightCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightCommand::On => write!(f, "on"),
            LightCommand::Off => write!(f, "off"),
        }
    }
}

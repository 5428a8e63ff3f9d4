//! # keylight
//!
//! Keyboard backlight automation for BLE keyboards: the light goes off when
//! the machine or its displays go to sleep and back on when they wake during
//! a configured night window.
//!
//! ## Architecture
//!
//! - **Entry Point**: [`Keylight`] acquires resources and runs monitor mode
//! - **Core Logic**: internal `core` module with the event loop
//! - **BLE**: `ble` command protocol client (session stages, keep-alive)
//! - **Monitor**: `monitor` power classification, debounce and night window
//! - **Dispatch**: `dispatch` maps events to commands, in-process or external
//! - **Configuration**: `config` TOML settings with validation and hot reload
//! - **Commands**: `commands` one-shot and keep-alive CLI modes
//! - **Infrastructure**: `io` signals, D-Bus, display power, lock file

#[macro_use]
pub mod common;

pub mod args;
pub mod ble;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod io;
pub mod monitor;

mod core;
mod keylight;

pub use keylight::Keylight;

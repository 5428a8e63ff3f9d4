//! Dispatch through an external command-line tool.
//!
//! The program is executed directly (no shell) as
//! `<program> --on|--off [--uuid ID]`. Its output is captured and logged.

use std::path::PathBuf;
use std::process::Command;

use super::{DispatchError, LightSwitch};
use crate::ble::{DeviceIdentifier, LightCommand};

pub struct ExternalCommand {
    program: PathBuf,
    device: Option<DeviceIdentifier>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>, device: Option<DeviceIdentifier>) -> Self {
        Self {
            program: program.into(),
            device,
        }
    }

    pub fn args(&self, command: LightCommand) -> Vec<String> {
        let mut args = vec![command.as_flag().to_string()];
        if let Some(device) = &self.device {
            args.push("--uuid".to_string());
            args.push(device.to_string());
        }
        args
    }

    /// Full command line for logs.
    pub fn command_line(&self, command: LightCommand) -> String {
        let mut line = self.program.display().to_string();
        for arg in self.args(command) {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

impl LightSwitch for ExternalCommand {
    fn set(&mut self, command: LightCommand) -> Result<(), DispatchError> {
        let command_line = self.command_line(command);
        log_indented!("Running: {command_line}");

        let output = Command::new(&self.program)
            .args(self.args(command))
            .output()
            .map_err(|source| DispatchError::Spawn {
                command: command_line.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            log_indented!("{line}");
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            log_indented!("Command finished: {}", output.status);
            Ok(())
        } else {
            Err(DispatchError::ExitStatus {
                command: command_line,
                status: output.status.to_string(),
                stderr,
            })
        }
    }

    fn describe(&self) -> String {
        format!("external command {}", self.program.display())
    }

    fn shutdown(&mut self) {}
}

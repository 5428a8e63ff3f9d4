//! Command-line argument parsing and processing.
//!
//! Three modes share one flag set:
//! - no mode flag runs the power monitor
//! - `--on` / `--off` deliver one command and exit
//! - `--interval`, or `--uuid` without `--on`/`--off`, keeps the light on
//!
//! Parsing never fails outright: problems become [`CliAction::ShowHelpDueToError`]
//! (unknown flags) or [`CliAction::InvalidUsage`] (conflicting or malformed
//! values) so `main` decides how to report them.

use crate::ble::LightCommand;
use crate::common::constants::MINIMUM_KEEP_ALIVE_INTERVAL;

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the power monitor
    Monitor {
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
    },
    /// Send one command and exit
    Light {
        command: LightCommand,
        device: Option<String>,
        debug_enabled: bool,
        config_dir: Option<String>,
    },
    /// Turn the light on and resend until interrupted
    KeepAlive {
        device: Option<String>,
        interval: Option<f64>,
        debug_enabled: bool,
        config_dir: Option<String>,
        log_file: Option<String>,
    },
    ShowHelp,
    ShowVersion,
    /// Unknown flag
    ShowHelpDueToError,
    /// Recognised flags used in a way that cannot work
    InvalidUsage(String),
}

#[derive(Debug, PartialEq)]
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    /// Parse an argument list; the first item is the program name.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut debug_enabled = false;
        let mut display_help = false;
        let mut display_version = false;
        let mut unknown_arg_found = false;
        let mut on = false;
        let mut off = false;
        let mut device: Option<String> = None;
        let mut interval_arg: Option<String> = None;
        let mut config_dir: Option<String> = None;
        let mut log_file: Option<String> = None;
        let mut missing_value: Option<String> = None;

        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut iter = args_vec.iter();
        while let Some(arg) = iter.next() {
            let slot = match arg.as_str() {
                "--help" | "-h" => {
                    display_help = true;
                    continue;
                }
                "--version" | "-V" | "-v" => {
                    display_version = true;
                    continue;
                }
                "--debug" | "-d" => {
                    debug_enabled = true;
                    continue;
                }
                "--on" => {
                    on = true;
                    continue;
                }
                "--off" => {
                    off = true;
                    continue;
                }
                "--uuid" | "-u" => &mut device,
                "--interval" | "-i" => &mut interval_arg,
                "--config" | "-c" => &mut config_dir,
                "--log" | "-l" => &mut log_file,
                _ => {
                    unknown_arg_found = true;
                    continue;
                }
            };
            match iter.next() {
                Some(value) if !value.starts_with('-') || value.parse::<f64>().is_ok() => {
                    *slot = Some(value.clone());
                }
                _ => {
                    missing_value.get_or_insert_with(|| arg.clone());
                    break;
                }
            }
        }

        let action = if display_help {
            CliAction::ShowHelp
        } else if display_version {
            CliAction::ShowVersion
        } else if unknown_arg_found {
            CliAction::ShowHelpDueToError
        } else if let Some(flag) = missing_value {
            CliAction::InvalidUsage(format!("{flag} requires a value"))
        } else if on && off {
            CliAction::InvalidUsage("--on and --off cannot be combined".to_string())
        } else if off && interval_arg.is_some() {
            CliAction::InvalidUsage("--interval only applies to keeping the light on".to_string())
        } else if interval_arg.is_some() || (device.is_some() && !on && !off) {
            match interval_arg.as_deref().map(parse_interval).transpose() {
                Ok(interval) => CliAction::KeepAlive {
                    device,
                    interval,
                    debug_enabled,
                    config_dir,
                    log_file,
                },
                Err(reason) => CliAction::InvalidUsage(reason),
            }
        } else if on || off {
            CliAction::Light {
                command: if on { LightCommand::On } else { LightCommand::Off },
                device,
                debug_enabled,
                config_dir,
            }
        } else {
            CliAction::Monitor {
                debug_enabled,
                config_dir,
                log_file,
            }
        };

        ParsedArgs { action }
    }

    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn parse_interval(value: &str) -> Result<f64, String> {
    let interval: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("--interval '{value}' is not a number"))?;
    if !interval.is_finite() || interval < MINIMUM_KEEP_ALIVE_INTERVAL {
        return Err(format!(
            "--interval must be at least {MINIMUM_KEEP_ALIVE_INTERVAL:.1} seconds (got {value})"
        ));
    }
    Ok(interval)
}

/// Displays version information using custom logging style.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("keylight [OPTIONS]                      Run the power monitor");
    log_indented!("keylight --on|--off [--uuid <id>]       Turn the light on or off once");
    log_indented!("keylight [--on] --uuid <id> --interval <s>");
    log_indented!("                                        Keep the light on");
    log_block_start!("Options:");
    log_indented!("-u, --uuid <id>        Accessory identifier (default: config, then scan)");
    log_indented!("-i, --interval <s>     Keep-alive resend interval, at least 1.0 (default 6.5)");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-l, --log <file>       Append log output to a file");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Signals (monitor mode):");
    log_indented!("SIGUSR2                Reload configuration");
    log_indented!("SIGINT, SIGTERM        Disconnect and exit");
    log_end!();
}

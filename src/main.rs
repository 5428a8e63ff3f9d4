//! Main application entry point.
//!
//! Parses arguments, records the config directory and hands off to the
//! matching mode. Everything else lives in the library.

use anyhow::Result;

use keylight::Keylight;
use keylight::args::{self, CliAction, ParsedArgs};
use keylight::commands;
use keylight::common::constants::EXIT_FAILURE;
use keylight::config;
use keylight::{log_end, log_error, log_error_exit, log_pipe};

fn main() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    let result = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::InvalidUsage(reason) => {
            log_pipe!();
            log_error!("{reason}");
            log_end!();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::Monitor {
            debug_enabled,
            config_dir,
            log_file,
        } => config::set_config_dir(config_dir).and_then(|()| {
            Keylight::new(debug_enabled)
                .with_log_file(log_file.map(Into::into))
                .run()
        }),
        CliAction::Light {
            command,
            device,
            debug_enabled,
            config_dir,
        } => config::set_config_dir(config_dir).and_then(|()| {
            commands::light::handle_light_command(command, device, debug_enabled)
        }),
        CliAction::KeepAlive {
            device,
            interval,
            debug_enabled,
            config_dir,
            log_file,
        } => config::set_config_dir(config_dir).and_then(|()| {
            commands::keep_alive::handle_keep_alive_command(
                device,
                interval,
                log_file,
                debug_enabled,
            )
        }),
    };

    if let Err(e) = result {
        log_error_exit!("{e:#}");
        std::process::exit(EXIT_FAILURE);
    }
    Ok(())
}

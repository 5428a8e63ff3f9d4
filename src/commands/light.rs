//! One-shot `--on` / `--off`.
//!
//! Runs one full session, waits briefly for the accessory's notification
//! after an acknowledged write, disconnects and exits. Exit status is 0 on an
//! acknowledged write and 1 on any failure. SIGINT or SIGTERM while the
//! session is open disconnects it and exits 1.

use anyhow::Result;

use crate::ble::{BtleRadio, Cancel, LightClient, LightCommand};
use crate::common::constants::{EXIT_FAILURE, NOTIFY_GRACE};

pub fn handle_light_command(
    command: LightCommand,
    device: Option<String>,
    debug_enabled: bool,
) -> Result<()> {
    log_version!();

    let config = super::load_config_or_defaults();
    let target = super::resolve_target(&config, device.as_deref())?;
    match &target.id {
        Some(id) => log_block_start!("Turning light {command} on {id}"),
        None => log_block_start!("Turning light {command} (scanning for accessory)"),
    }

    let shutdown_rx = super::shutdown_watch(debug_enabled)?;
    let runtime = super::build_runtime()?;
    let radio = match runtime.block_on(BtleRadio::open()) {
        Ok(radio) => radio,
        Err(e) => {
            log_error_exit!("{e}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let client = LightClient::new(radio, target)
        .with_linger(NOTIFY_GRACE)
        .with_debug(debug_enabled);

    // The client has already logged the failure
    if runtime
        .block_on(client.send_until(command, Cancel::on(shutdown_rx)))
        .is_err()
    {
        log_end!();
        std::process::exit(EXIT_FAILURE);
    }

    log_end!();
    Ok(())
}

//! Dispatch through the BLE client in this process.
//!
//! The event loop is synchronous, so the switch owns a small tokio runtime and
//! blocks on each command. The adapter is opened lazily on first use and
//! reopened after a radio failure.

use tokio::runtime::Runtime;

use super::{DispatchError, LightSwitch};
use crate::ble::session::Target;
use crate::ble::{BtleRadio, ClientError, LightClient, LightCommand};
use crate::common::constants::NOTIFY_GRACE;

pub struct InProcessSwitch {
    runtime: Option<Runtime>,
    client: Option<LightClient<BtleRadio>>,
    target: Target,
    debug_enabled: bool,
}

impl InProcessSwitch {
    pub fn new(target: Target, debug_enabled: bool) -> Result<Self, DispatchError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("keylight-ble")
            .enable_all()
            .build()
            .map_err(|e| DispatchError::Runtime(e.to_string()))?;
        Ok(Self {
            runtime: Some(runtime),
            client: None,
            target,
            debug_enabled,
        })
    }
}

impl LightSwitch for InProcessSwitch {
    fn set(&mut self, command: LightCommand) -> Result<(), DispatchError> {
        let Some(runtime) = &self.runtime else {
            return Err(DispatchError::Runtime("switch already shut down".into()));
        };

        let client = match self.client.take() {
            Some(client) => client,
            None => {
                let radio = runtime.block_on(BtleRadio::open())?;
                LightClient::new(radio, self.target.clone())
                    .with_linger(NOTIFY_GRACE)
                    .with_debug(self.debug_enabled)
            }
        };

        let result = runtime.block_on(client.send(command));
        // Keep the adapter unless it went away
        if !matches!(result, Err(ClientError::RadioUnavailable(_))) {
            self.client = Some(client);
        }
        result.map_err(DispatchError::from)
    }

    fn describe(&self) -> String {
        match &self.target.id {
            Some(id) => format!("in-process BLE client ({id})"),
            None => "in-process BLE client (scan)".to_string(),
        }
    }

    fn shutdown(&mut self) {
        // Sessions are closed after every command; dropping the client
        // releases the adapter handle
        self.client = None;
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(std::time::Duration::from_secs(1));
        }
    }
}

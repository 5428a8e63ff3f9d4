//! Client-level error taxonomy.

use std::time::Duration;
use thiserror::Error;

use super::session::Stage;

/// Terminal failure of one client command.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No adapter, or the adapter is powered off.
    #[error("Bluetooth radio unavailable: {0}")]
    RadioUnavailable(String),

    /// Neither identifier lookup nor the fallback scan found the accessory.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The BLE stack reported an error during a stage.
    #[error("protocol error during {stage}: {source}")]
    Protocol {
        stage: Stage,
        #[source]
        source: btleplug::Error,
    },

    /// A stage did not complete within the watchdog.
    #[error("{stage} timed out after {}s", after.as_secs())]
    TimedOut { stage: Stage, after: Duration },

    /// Another command already holds the session slot.
    #[error("another light command is already in progress")]
    Busy,

    /// Shutdown was requested before the command completed. Any link that had
    /// been opened is disconnected first.
    #[error("interrupted by shutdown")]
    Cancelled,
}

impl ClientError {
    /// Whether a keep-alive loop may start a fresh cycle after this error.
    ///
    /// Radio and lookup failures abort the current invocation outright.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Protocol { .. } | ClientError::TimedOut { .. }
        )
    }

    /// Stage at which the command failed, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ClientError::Protocol { stage, .. } | ClientError::TimedOut { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }
}

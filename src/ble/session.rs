//! Connection session stage machine.
//!
//! [`establish`] walks Idle → Connecting → ServiceDiscovery →
//! CharacteristicDiscovery and hands back a [`CommandChannel`]. Writing is only
//! possible through that channel, so a write without a connected, discovered
//! session cannot be expressed. Every failure after the link has been touched
//! disconnects it before the error is returned, and so does a shutdown that
//! arrives mid-session through [`Cancel`].

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use super::command::LightCommand;
use super::error::ClientError;
use super::radio::{CharacteristicRef, Link, Radio, ScanMatcher};
use super::DeviceIdentifier;
use crate::common::constants::{LIGHT_CHARACTERISTIC_UUID, LIGHT_SERVICE_UUID};

/// Stage of one connection session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Connecting,
    ServiceDiscovery,
    CharacteristicDiscovery,
    Writing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Connecting => "connecting",
            Stage::ServiceDiscovery => "service discovery",
            Stage::CharacteristicDiscovery => "characteristic discovery",
            Stage::Writing => "writing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Which accessory a session should reach.
#[derive(Debug, Clone)]
pub struct Target {
    /// Known identifier; `None` goes straight to the advertisement scan.
    pub id: Option<DeviceIdentifier>,
    pub matcher: ScanMatcher,
    pub scan_window: Duration,
}

impl Target {
    pub fn new(id: Option<DeviceIdentifier>, scan_window: Duration) -> Self {
        Self {
            id,
            matcher: ScanMatcher::default(),
            scan_window,
        }
    }

    /// Warning for a scan that cannot confirm the configured identifier.
    ///
    /// Advertisements do not carry the identifier, so once lookup misses (as it
    /// always does on BlueZ, whose ids are object paths) the scan accepts any
    /// keyboard that matches by service or name.
    pub fn unverified_scan_warning(&self) -> Option<String> {
        self.id.map(|id| {
            format!("Device {id} not known to the adapter, scanning without identity check")
        })
    }
}

/// Shutdown request observed by a running session.
///
/// A dropped sender counts as a shutdown request.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Option<watch::Receiver<bool>>);

impl Cancel {
    /// A session that only ends by completing or failing.
    pub fn never() -> Self {
        Self(None)
    }

    pub fn on(shutdown: watch::Receiver<bool>) -> Self {
        Self(Some(shutdown))
    }

    pub fn is_requested(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|rx| *rx.borrow() || rx.has_changed().is_err())
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&mut self) {
        match &mut self.0 {
            Some(rx) => {
                let _ = rx.wait_for(|stop| *stop).await;
            }
            None => std::future::pending().await,
        }
    }
}

/// A connected session with its control characteristic located.
pub struct CommandChannel<L: Link> {
    link: L,
    characteristic: CharacteristicRef,
}

impl<L: Link> CommandChannel<L> {
    /// Writing → Done on acknowledgement, Writing → Failed otherwise.
    pub async fn write(
        &self,
        command: LightCommand,
        stage_timeout: Duration,
    ) -> Result<(), ClientError> {
        let payload = command.encode();
        guarded(
            Stage::Writing,
            stage_timeout,
            self.link.write_acked(&self.characteristic, &payload),
        )
        .await
    }

    pub async fn is_alive(&self) -> bool {
        self.link.is_connected().await
    }

    pub fn describe(&self) -> String {
        self.link.describe()
    }

    /// Release the session.
    pub async fn close(self) {
        let _ = self.link.disconnect().await;
    }
}

/// Bound a BLE operation by the stage watchdog and tag its error with the stage.
async fn guarded<T, F>(stage: Stage, limit: Duration, operation: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, btleplug::Error>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(ClientError::Protocol { stage, source }),
        Err(_) => Err(ClientError::TimedOut {
            stage,
            after: limit,
        }),
    }
}

/// Run the session from Idle up to a writable channel.
///
/// A shutdown request abandons the lookup or scan, or disconnects the link if
/// the connect attempt has already started, and yields [`ClientError::Cancelled`].
pub async fn establish<R: Radio>(
    radio: &R,
    target: &Target,
    stage_timeout: Duration,
    debug_enabled: bool,
    cancel: &mut Cancel,
) -> Result<CommandChannel<R::Link>, ClientError> {
    if cancel.is_requested() {
        return Err(ClientError::Cancelled);
    }
    radio.ensure_powered().await?;

    trace(debug_enabled, Stage::Connecting);
    let link = tokio::select! {
        located = locate(radio, target, stage_timeout) => located?,
        _ = cancel.requested() => return Err(ClientError::Cancelled),
    };

    let connected = tokio::select! {
        connected = guarded(Stage::Connecting, stage_timeout, link.connect()) => connected,
        _ = cancel.requested() => Err(ClientError::Cancelled),
    };
    if let Err(e) = connected {
        let _ = link.disconnect().await;
        return Err(e);
    }
    log_decorated!("Connected to {}", link.describe());

    let discovered = tokio::select! {
        discovered = discover(&link, stage_timeout, debug_enabled) => discovered,
        _ = cancel.requested() => Err(ClientError::Cancelled),
    };
    match discovered {
        Ok(characteristic) => Ok(CommandChannel {
            link,
            characteristic,
        }),
        Err(e) => {
            let _ = link.disconnect().await;
            Err(e)
        }
    }
}

/// Identifier lookup first, advertisement scan as fallback.
async fn locate<R: Radio>(
    radio: &R,
    target: &Target,
    stage_timeout: Duration,
) -> Result<R::Link, ClientError> {
    if let Some(id) = &target.id {
        if let Some(link) = guarded(Stage::Connecting, stage_timeout, radio.lookup(id)).await? {
            return Ok(link);
        }
        if let Some(warning) = target.unverified_scan_warning() {
            log_pipe!();
            log_warning!("{warning}");
            log_indented!("The first matching keyboard in range will be used");
        }
    }

    let scan_limit = target.scan_window + stage_timeout;
    let found = guarded(
        Stage::Connecting,
        scan_limit,
        radio.scan(&target.matcher, target.scan_window),
    )
    .await?;

    found.ok_or_else(|| {
        let wanted = match &target.id {
            Some(id) => format!("{id} (lookup and {}s scan)", target.scan_window.as_secs()),
            None => format!("no matching accessory within {}s scan", target.scan_window.as_secs()),
        };
        ClientError::DeviceNotFound(wanted)
    })
}

async fn discover<L: Link>(
    link: &L,
    stage_timeout: Duration,
    debug_enabled: bool,
) -> Result<CharacteristicRef, ClientError> {
    trace(debug_enabled, Stage::ServiceDiscovery);
    guarded(Stage::ServiceDiscovery, stage_timeout, link.discover_services()).await?;
    if !link.has_service(LIGHT_SERVICE_UUID) {
        return Err(ClientError::Protocol {
            stage: Stage::ServiceDiscovery,
            source: btleplug::Error::NotSupported(format!(
                "service {LIGHT_SERVICE_UUID} not offered"
            )),
        });
    }

    trace(debug_enabled, Stage::CharacteristicDiscovery);
    let characteristic = link
        .characteristic(LIGHT_SERVICE_UUID, LIGHT_CHARACTERISTIC_UUID)
        .ok_or(ClientError::Protocol {
            stage: Stage::CharacteristicDiscovery,
            source: btleplug::Error::NoSuchCharacteristic,
        })?;

    // Notifications only confirm the change; the write does not depend on them
    match tokio::time::timeout(stage_timeout, link.subscribe(&characteristic)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log_warning!("Could not enable notifications: {e}"),
        Err(_) => log_warning!("Enabling notifications timed out"),
    }

    trace(debug_enabled, Stage::Writing);
    Ok(characteristic)
}

fn trace(debug_enabled: bool, stage: Stage) {
    if debug_enabled {
        log_debug!("BLE session → {stage}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::ServiceDiscovery.to_string(), "service discovery");
        assert_eq!(Stage::Done.to_string(), "done");
    }

    #[test]
    fn test_scan_warning_only_with_configured_identifier() {
        let id: DeviceIdentifier = "C2A4D1E0-1111-4222-8333-944445555666".parse().unwrap();
        let warning = Target::new(Some(id), Duration::from_secs(10))
            .unverified_scan_warning()
            .unwrap();
        assert!(warning.contains("C2A4D1E0-1111-4222-8333-944445555666"));
        assert!(Target::new(None, Duration::from_secs(10))
            .unverified_scan_warning()
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_guarded_times_out() {
        let result: Result<(), ClientError> = guarded(
            Stage::Connecting,
            Duration::from_secs(10),
            std::future::pending(),
        )
        .await;
        assert!(matches!(
            result,
            Err(ClientError::TimedOut {
                stage: Stage::Connecting,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_cancel_follows_shutdown_channel() {
        assert!(!Cancel::never().is_requested());

        let (tx, rx) = watch::channel(false);
        let mut cancel = Cancel::on(rx);
        assert!(!cancel.is_requested());

        tx.send(true).unwrap();
        assert!(cancel.is_requested());
        cancel.requested().await;
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_shutdown() {
        let (tx, rx) = watch::channel(false);
        let mut cancel = Cancel::on(rx);
        drop(tx);
        assert!(cancel.is_requested());
        cancel.requested().await;
    }

    #[tokio::test]
    async fn test_guarded_tags_protocol_errors() {
        let result: Result<(), ClientError> = guarded(
            Stage::Writing,
            Duration::from_secs(1),
            async { Err(btleplug::Error::NotConnected) },
        )
        .await;
        assert!(matches!(
            result,
            Err(ClientError::Protocol {
                stage: Stage::Writing,
                ..
            })
        ));
    }
}

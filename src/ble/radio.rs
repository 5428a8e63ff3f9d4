//! Host BLE stack abstraction.
//!
//! `Radio` finds the accessory and `Link` talks to one connected peripheral.
//! The production implementation wraps `btleplug`; the session and client code
//! is generic over these traits so the stage machine can be driven by a fake
//! stack in tests.

use btleplug::api::{
    Central, CentralState, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::DeviceIdentifier;
use super::error::ClientError;
use crate::common::constants::{
    DEVICE_NAME_PREFIXES, LIGHT_SERVICE_UUID, SCAN_POLL_INTERVAL,
};

/// Located characteristic within a discovered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicRef {
    pub service: Uuid,
    pub uuid: Uuid,
}

/// Advertisement filter for the fallback scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatcher {
    pub service: Uuid,
    pub name_prefixes: Vec<String>,
}

impl Default for ScanMatcher {
    fn default() -> Self {
        Self {
            service: LIGHT_SERVICE_UUID,
            name_prefixes: DEVICE_NAME_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ScanMatcher {
    /// An advertisement matches on the service UUID or an upper-cased name prefix.
    pub fn matches(&self, local_name: Option<&str>, services: &[Uuid]) -> bool {
        if services.contains(&self.service) {
            return true;
        }
        local_name.is_some_and(|name| {
            let name = name.to_uppercase();
            self.name_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
        })
    }
}

/// Entry point to the host's BLE central role.
pub trait Radio: Send + Sync {
    type Link: Link;

    /// Fail with `RadioUnavailable` unless the adapter is powered on.
    fn ensure_powered(&self) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Retrieve an already-known peripheral by identifier without scanning.
    fn lookup(
        &self,
        id: &DeviceIdentifier,
    ) -> impl Future<Output = Result<Option<Self::Link>, btleplug::Error>> + Send;

    /// Scan advertisements for up to `window`, returning the first match.
    /// The scan is stopped before returning.
    fn scan(
        &self,
        matcher: &ScanMatcher,
        window: Duration,
    ) -> impl Future<Output = Result<Option<Self::Link>, btleplug::Error>> + Send;
}

/// One peripheral reachable through the radio.
pub trait Link: Send + Sync {
    /// Short human-readable label for logs.
    fn describe(&self) -> String;

    fn connect(&self) -> impl Future<Output = Result<(), btleplug::Error>> + Send;

    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    fn discover_services(&self) -> impl Future<Output = Result<(), btleplug::Error>> + Send;

    /// Whether `service` was found by the last discovery.
    fn has_service(&self, service: Uuid) -> bool;

    fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<CharacteristicRef>;

    fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> impl Future<Output = Result<(), btleplug::Error>> + Send;

    /// Write with response; resolves once the peripheral acknowledges.
    fn write_acked(
        &self,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), btleplug::Error>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), btleplug::Error>> + Send;
}

/// `btleplug`-backed radio using the first adapter.
pub struct BtleRadio {
    adapter: Adapter,
}

impl BtleRadio {
    /// Open the first Bluetooth adapter.
    pub async fn open() -> Result<Self, ClientError> {
        let manager = Manager::new()
            .await
            .map_err(|e| ClientError::RadioUnavailable(format!("Bluetooth manager: {e}")))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| ClientError::RadioUnavailable(format!("adapter list: {e}")))?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::RadioUnavailable("no Bluetooth adapter found".into()))?;
        Ok(Self { adapter })
    }
}

impl Radio for BtleRadio {
    type Link = BtleLink;

    async fn ensure_powered(&self) -> Result<(), ClientError> {
        match self.adapter.adapter_state().await {
            Ok(CentralState::PoweredOn) => Ok(()),
            Ok(state) => Err(ClientError::RadioUnavailable(format!(
                "adapter state is {state:?}"
            ))),
            Err(e) => Err(ClientError::RadioUnavailable(e.to_string())),
        }
    }

    async fn lookup(&self, id: &DeviceIdentifier) -> Result<Option<BtleLink>, btleplug::Error> {
        let peripherals = self.adapter.peripherals().await?;
        Ok(peripherals
            .into_iter()
            .find(|p| id.matches(&format!("{:?}", p.id())))
            .map(|peripheral| BtleLink { peripheral }))
    }

    async fn scan(
        &self,
        matcher: &ScanMatcher,
        window: Duration,
    ) -> Result<Option<BtleLink>, btleplug::Error> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        let found = self.poll_advertisements(matcher, window).await;
        // Stop regardless of outcome so the adapter does not keep scanning
        let _ = self.adapter.stop_scan().await;
        found
    }
}

impl BtleRadio {
    async fn poll_advertisements(
        &self,
        matcher: &ScanMatcher,
        window: Duration,
    ) -> Result<Option<BtleLink>, btleplug::Error> {
        let deadline = Instant::now() + window;
        loop {
            let mut seen = Vec::new();
            for peripheral in self.adapter.peripherals().await? {
                let properties = peripheral.properties().await;
                seen.push((peripheral, properties));
            }
            if let Some(peripheral) = select_advertised(matcher, seen) {
                return Ok(Some(BtleLink { peripheral }));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        }
    }
}

/// First peripheral whose advertisement matches.
///
/// A peripheral whose properties cannot be read is skipped, so one
/// misbehaving neighbour does not end the scan.
fn select_advertised<P>(
    matcher: &ScanMatcher,
    seen: Vec<(P, Result<Option<PeripheralProperties>, btleplug::Error>)>,
) -> Option<P> {
    seen.into_iter().find_map(|(peripheral, properties)| match properties {
        Ok(Some(props)) if matcher.matches(props.local_name.as_deref(), &props.services) => {
            Some(peripheral)
        }
        // Unreadable or non-matching
        _ => None,
    })
}

/// Connected (or connectable) `btleplug` peripheral.
pub struct BtleLink {
    peripheral: Peripheral,
}

impl BtleLink {
    fn resolve(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<btleplug::api::Characteristic, btleplug::Error> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service)
            .ok_or(btleplug::Error::NoSuchCharacteristic)
    }
}

impl Link for BtleLink {
    fn describe(&self) -> String {
        self.peripheral.address().to_string()
    }

    async fn connect(&self) -> Result<(), btleplug::Error> {
        self.peripheral.connect().await
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn discover_services(&self) -> Result<(), btleplug::Error> {
        self.peripheral.discover_services().await
    }

    fn has_service(&self, service: Uuid) -> bool {
        self.peripheral.services().iter().any(|s| s.uuid == service)
    }

    fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<CharacteristicRef> {
        self.peripheral
            .characteristics()
            .iter()
            .any(|c| c.uuid == characteristic && c.service_uuid == service)
            .then_some(CharacteristicRef {
                service,
                uuid: characteristic,
            })
    }

    async fn subscribe(&self, characteristic: &CharacteristicRef) -> Result<(), btleplug::Error> {
        let resolved = self.resolve(characteristic)?;
        self.peripheral.subscribe(&resolved).await
    }

    async fn write_acked(
        &self,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> Result<(), btleplug::Error> {
        let resolved = self.resolve(characteristic)?;
        self.peripheral
            .write(&resolved, payload, WriteType::WithResponse)
            .await
    }

    async fn disconnect(&self) -> Result<(), btleplug::Error> {
        self.peripheral.disconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matcher_accepts_service_uuid() {
        let matcher = ScanMatcher::default();
        assert!(matcher.matches(None, &[LIGHT_SERVICE_UUID]));
        assert!(!matcher.matches(None, &[Uuid::nil()]));
    }

    #[test]
    fn test_matcher_accepts_name_prefix_case_insensitively() {
        let matcher = ScanMatcher::default();
        assert!(matcher.matches(Some("MX Mchncl"), &[]));
        assert!(matcher.matches(Some("mx mechanical mini"), &[]));
        assert!(!matcher.matches(Some("MX Master 3"), &[]));
        assert!(!matcher.matches(Some("Keyboard MX MECHANICAL"), &[]));
    }

    fn advert(name: &str) -> Result<Option<PeripheralProperties>, btleplug::Error> {
        Ok(Some(PeripheralProperties {
            local_name: Some(name.to_string()),
            ..Default::default()
        }))
    }

    #[test]
    fn test_unreadable_peripheral_does_not_end_scan() {
        let seen = vec![
            ("speaker", Err(btleplug::Error::DeviceNotFound)),
            ("unnamed", Ok(None)),
            ("mouse", advert("MX Master 3")),
            ("keyboard", advert("MX MCHNCL")),
        ];
        assert_eq!(
            select_advertised(&ScanMatcher::default(), seen),
            Some("keyboard")
        );
    }

    #[test]
    fn test_no_match_when_nothing_advertises_the_light() {
        let seen = vec![
            ("speaker", Err(btleplug::Error::NotConnected)),
            ("mouse", advert("MX Master 3")),
        ];
        assert_eq!(select_advertised(&ScanMatcher::default(), seen), None);
    }
}

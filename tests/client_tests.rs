//! BLE client scenarios against an in-memory radio.

use keylight::ble::radio::CharacteristicRef;
use keylight::ble::session::Target;
use keylight::ble::{Cancel, ClientError, LightClient, LightCommand, Link, Radio, ScanMatcher, Stage};
use keylight::common::logger::Log;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

const KNOWN_ID: &str = "C2A4D1E0-1111-4222-8333-944445555666";

#[derive(Clone)]
struct Behavior {
    powered: bool,
    known: bool,
    advertises: bool,
    has_service: bool,
    has_characteristic: bool,
    hang_connect: bool,
    hang_discover: bool,
    /// 1-based write number that the peripheral rejects
    fail_write: Option<usize>,
    /// The link goes down right after this write number
    drop_after_write: Option<usize>,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            powered: true,
            known: true,
            advertises: true,
            has_service: true,
            has_characteristic: true,
            hang_connect: false,
            hang_discover: false,
            fail_write: None,
            drop_after_write: None,
        }
    }
}

#[derive(Default)]
struct Stats {
    lookups: AtomicUsize,
    scans: AtomicUsize,
    connects: AtomicUsize,
    discovers: AtomicUsize,
    writes: AtomicUsize,
    disconnects: AtomicUsize,
    connected: AtomicBool,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl Stats {
    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct FakeRadio {
    behavior: Behavior,
    stats: Arc<Stats>,
}

struct FakeLink {
    behavior: Behavior,
    stats: Arc<Stats>,
}

impl FakeRadio {
    fn link(&self) -> FakeLink {
        FakeLink {
            behavior: self.behavior.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl Radio for FakeRadio {
    type Link = FakeLink;

    async fn ensure_powered(&self) -> Result<(), ClientError> {
        if self.behavior.powered {
            Ok(())
        } else {
            Err(ClientError::RadioUnavailable("adapter powered off".into()))
        }
    }

    async fn lookup(
        &self,
        _id: &keylight::ble::DeviceIdentifier,
    ) -> Result<Option<FakeLink>, btleplug::Error> {
        self.stats.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.behavior.known.then(|| self.link()))
    }

    async fn scan(
        &self,
        _matcher: &ScanMatcher,
        window: Duration,
    ) -> Result<Option<FakeLink>, btleplug::Error> {
        self.stats.scans.fetch_add(1, Ordering::SeqCst);
        if self.behavior.advertises {
            Ok(Some(self.link()))
        } else {
            tokio::time::sleep(window).await;
            Ok(None)
        }
    }
}

impl Link for FakeLink {
    fn describe(&self) -> String {
        "fake keyboard".to_string()
    }

    async fn connect(&self) -> Result<(), btleplug::Error> {
        if self.behavior.hang_connect {
            std::future::pending::<()>().await;
        }
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        self.stats.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.stats.connected.load(Ordering::SeqCst)
    }

    async fn discover_services(&self) -> Result<(), btleplug::Error> {
        self.stats.discovers.fetch_add(1, Ordering::SeqCst);
        if self.behavior.hang_discover {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    fn has_service(&self, _service: Uuid) -> bool {
        self.behavior.has_service
    }

    fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Option<CharacteristicRef> {
        self.behavior.has_characteristic.then_some(CharacteristicRef {
            service,
            uuid: characteristic,
        })
    }

    async fn subscribe(&self, _characteristic: &CharacteristicRef) -> Result<(), btleplug::Error> {
        Ok(())
    }

    async fn write_acked(
        &self,
        _characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> Result<(), btleplug::Error> {
        if !self.stats.connected.load(Ordering::SeqCst) {
            return Err(btleplug::Error::NotConnected);
        }
        let n = self.stats.writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats
            .payloads
            .lock()
            .unwrap()
            .push(payload.to_vec());
        if self.behavior.fail_write == Some(n) {
            return Err(btleplug::Error::NotSupported("write rejected".into()));
        }
        if self.behavior.drop_after_write == Some(n) {
            self.stats.connected.store(false, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), btleplug::Error> {
        self.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        self.stats.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn client(behavior: Behavior, with_id: bool) -> (LightClient<FakeRadio>, Arc<Stats>) {
    Log::set_enabled(false);
    let stats = Arc::new(Stats::default());
    let radio = FakeRadio {
        behavior,
        stats: Arc::clone(&stats),
    };
    let id = with_id.then(|| KNOWN_ID.parse().unwrap());
    let target = Target::new(id, Duration::from_secs(10));
    (LightClient::new(radio, target), stats)
}

fn assert_released(client: &LightClient<FakeRadio>, stats: &Stats) {
    assert!(client.is_idle());
    assert!(!stats.connected.load(Ordering::SeqCst));
    assert_eq!(
        Stats::count(&stats.connects),
        Stats::count(&stats.disconnects)
    );
}

#[tokio::test]
async fn test_send_writes_payload_and_disconnects() {
    let (client, stats) = client(Behavior::default(), true);

    client.send(LightCommand::On).await.unwrap();

    assert_eq!(Stats::count(&stats.lookups), 1);
    assert_eq!(Stats::count(&stats.scans), 0);
    assert_eq!(Stats::count(&stats.connects), 1);
    assert_eq!(
        stats.payloads.lock().unwrap().as_slice(),
        &[vec![0x0B, 0x1E, 0x01, 0, 0, 0, 0, 0]]
    );
    assert_released(&client, &stats);
}

#[tokio::test]
async fn test_off_payload() {
    let (client, stats) = client(Behavior::default(), false);
    client.send(LightCommand::Off).await.unwrap();
    assert_eq!(
        stats.payloads.lock().unwrap().as_slice(),
        &[vec![0x0B, 0x1E, 0x00, 0, 0, 0, 0, 0]]
    );
}

#[tokio::test]
async fn test_unknown_identifier_falls_back_to_scan() {
    let behavior = Behavior {
        known: false,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);

    client.send(LightCommand::On).await.unwrap();

    assert_eq!(Stats::count(&stats.lookups), 1);
    assert_eq!(Stats::count(&stats.scans), 1);
}

#[tokio::test]
async fn test_no_identifier_scans_without_lookup() {
    let (client, stats) = client(Behavior::default(), false);
    client.send(LightCommand::On).await.unwrap();
    assert_eq!(Stats::count(&stats.lookups), 0);
    assert_eq!(Stats::count(&stats.scans), 1);
}

#[tokio::test(start_paused = true)]
async fn test_device_not_found() {
    let behavior = Behavior {
        known: false,
        advertises: false,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);

    let err = client.send(LightCommand::On).await.unwrap_err();

    assert!(matches!(err, ClientError::DeviceNotFound(_)), "{err}");
    assert_eq!(Stats::count(&stats.connects), 0);
    assert_released(&client, &stats);
}

#[tokio::test]
async fn test_radio_unavailable() {
    let behavior = Behavior {
        powered: false,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);

    let err = client.send(LightCommand::Off).await.unwrap_err();

    assert!(matches!(err, ClientError::RadioUnavailable(_)));
    assert_eq!(Stats::count(&stats.lookups), 0);
    assert!(client.is_idle());
}

#[tokio::test]
async fn test_missing_service_is_protocol_error() {
    let behavior = Behavior {
        has_service: false,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);

    let err = client.send(LightCommand::On).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::ServiceDiscovery));
    assert!(matches!(err, ClientError::Protocol { .. }));
    assert_eq!(Stats::count(&stats.writes), 0);
    assert_released(&client, &stats);
}

#[tokio::test]
async fn test_missing_characteristic_is_protocol_error() {
    let behavior = Behavior {
        has_characteristic: false,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);

    let err = client.send(LightCommand::On).await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::CharacteristicDiscovery));
    assert_released(&client, &stats);
}

#[tokio::test]
async fn test_rejected_write_is_protocol_error() {
    let behavior = Behavior {
        fail_write: Some(1),
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);

    let err = client.send(LightCommand::On).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::Protocol {
            stage: Stage::Writing,
            ..
        }
    ));
    assert_released(&client, &stats);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_connect_times_out() {
    let behavior = Behavior {
        hang_connect: true,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);
    let client = client.with_stage_timeout(Duration::from_secs(2));

    let started = tokio::time::Instant::now();
    let err = client.send(LightCommand::On).await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(3));

    assert!(matches!(
        err,
        ClientError::TimedOut {
            stage: Stage::Connecting,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(Stats::count(&stats.disconnects), 1);
    assert!(client.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_request_is_rejected() {
    let behavior = Behavior {
        hang_connect: true,
        ..Behavior::default()
    };
    let (client, _stats) = client(behavior, true);

    let (first, second) = tokio::join!(client.send(LightCommand::On), client.send(LightCommand::Off));

    assert!(matches!(first, Err(ClientError::TimedOut { .. })));
    assert!(matches!(second, Err(ClientError::Busy)));
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_resends_on_one_session() {
    let (client, stats) = client(Behavior::default(), true);
    let client = Arc::new(client);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .keep_alive(LightCommand::On, Duration::from_secs(5), shutdown_rx)
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(Stats::count(&stats.writes) >= 3);
    assert_eq!(Stats::count(&stats.connects), 1);
    assert_eq!(Stats::count(&stats.discovers), 1);
    assert!(!client.is_idle());

    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();

    assert_released(&client, &stats);
    assert!(
        stats
            .payloads
            .lock()
            .unwrap()
            .iter()
            .all(|p| p[2] == 0x01)
    );
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_reconnects_after_link_drop() {
    let behavior = Behavior {
        drop_after_write: Some(2),
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);
    let client = Arc::new(client);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .keep_alive(LightCommand::On, Duration::from_secs(5), shutdown_rx)
                .await
        })
    };

    // Writes at 0s and 5s, drop noticed at 10s, fresh cycle at 15s
    tokio::time::sleep(Duration::from_secs(17)).await;
    assert_eq!(Stats::count(&stats.connects), 2);
    assert_eq!(Stats::count(&stats.discovers), 2);
    assert!(Stats::count(&stats.writes) >= 3);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();
    assert_released(&client, &stats);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_retries_after_rejected_write() {
    let behavior = Behavior {
        fail_write: Some(1),
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);
    let client = Arc::new(client);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .keep_alive(LightCommand::On, Duration::from_secs(5), shutdown_rx)
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(Stats::count(&stats.connects), 2);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();
    assert_released(&client, &stats);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_aborts_when_device_missing() {
    let behavior = Behavior {
        known: false,
        advertises: false,
        ..Behavior::default()
    };
    let (client, _stats) = client(behavior, true);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let err = client
        .keep_alive(LightCommand::On, Duration::from_secs(5), shutdown_rx)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::DeviceNotFound(_)));
    assert!(client.is_idle());
}

#[tokio::test]
async fn test_keep_alive_stops_immediately_when_already_shut_down() {
    let (client, stats) = client(Behavior::default(), true);
    let (_shutdown_tx, shutdown_rx) = watch::channel(true);

    client
        .keep_alive(LightCommand::On, Duration::from_secs(5), shutdown_rx)
        .await
        .unwrap();

    assert_eq!(Stats::count(&stats.connects), 0);
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_shutdown_during_discovery_disconnects() {
    let behavior = Behavior {
        hang_discover: true,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);
    let client = Arc::new(client);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .keep_alive(LightCommand::On, Duration::from_secs(5), shutdown_rx)
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(stats.connected.load(Ordering::SeqCst));
    assert_eq!(Stats::count(&stats.discovers), 1);

    shutdown_tx.send(true).unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(Stats::count(&stats.connects), 1);
    assert_eq!(Stats::count(&stats.disconnects), 1);
    assert_eq!(Stats::count(&stats.writes), 0);
    assert_released(&client, &stats);
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_send_disconnects_before_returning() {
    let behavior = Behavior {
        hang_discover: true,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (result, ()) = tokio::join!(
        client.send_until(LightCommand::Off, Cancel::on(shutdown_rx)),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            shutdown_tx.send(true).unwrap();
        }
    );

    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert!(!result.unwrap_err().is_retryable());
    assert_eq!(Stats::count(&stats.writes), 0);
    assert_eq!(Stats::count(&stats.disconnects), 1);
    assert_released(&client, &stats);
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_connect_disconnects() {
    let behavior = Behavior {
        hang_connect: true,
        ..Behavior::default()
    };
    let (client, stats) = client(behavior, true);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (result, ()) = tokio::join!(
        client.send_until(LightCommand::On, Cancel::on(shutdown_rx)),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            shutdown_tx.send(true).unwrap();
        }
    );

    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert_eq!(Stats::count(&stats.disconnects), 1);
    assert!(!stats.connected.load(Ordering::SeqCst));
    assert!(client.is_idle());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cuts_linger_short() {
    let (client, stats) = client(Behavior::default(), true);
    let client = client.with_linger(Duration::from_secs(5));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let started = tokio::time::Instant::now();
    let (result, ()) = tokio::join!(
        client.send_until(LightCommand::On, Cancel::on(shutdown_rx)),
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            shutdown_tx.send(true).unwrap();
        }
    );

    assert!(matches!(result, Err(ClientError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(Stats::count(&stats.writes), 1);
    assert_released(&client, &stats);
}

#[tokio::test]
async fn test_send_until_without_shutdown_completes() {
    let (client, stats) = client(Behavior::default(), true);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    client
        .send_until(LightCommand::On, Cancel::on(shutdown_rx))
        .await
        .unwrap();

    assert_eq!(Stats::count(&stats.writes), 1);
    assert_released(&client, &stats);
}

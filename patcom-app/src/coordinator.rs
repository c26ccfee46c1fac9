use std::collections::HashMap;
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use patcom_api::message::SyncRequest;
use patcom_api::transport::{TransportError, encode_within};
use patcom_api::{ConfigHash, ConfigPatch, ConfigReport, ConfigSnapshot};

use crate::error::{Error, Result};
use crate::registry::{DeviceRegistry, DiscoveredDevice};
use crate::sync::ConfigSyncTransport;

/// Result of syncing one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Hashes matched, nothing was sent
    AlreadyInSync { hash: ConfigHash },
    Updated { hash: ConfigHash },
    /// Only the network section fitted the device buffer; other sections are unchanged
    PartiallyApplied { hash: ConfigHash },
    Rejected { message: String },
    /// No answer this time; the record stays until its TTL runs out
    Unreachable,
    UnknownDevice,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SyncOutcome::AlreadyInSync { .. } | SyncOutcome::Updated { .. }
        )
    }
}

/// Pushes configuration to discovered devices, at most one sync in flight per device
pub struct Coordinator<T> {
    registry: Arc<DeviceRegistry>,
    transport: Arc<T>,
    max_payload: usize,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<T> Coordinator<T>
where
    T: ConfigSyncTransport + 'static,
{
    pub fn new(registry: Arc<DeviceRegistry>, transport: Arc<T>, max_payload: usize) -> Self {
        Self {
            registry,
            transport,
            max_payload,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Read the device's current configuration and refresh its known hash
    pub async fn fetch_config(&self, device_id: &str) -> Result<ConfigReport> {
        let device = self.device(device_id).await?;
        match self
            .transport
            .get_config(device.ip, &device.identity.device_id)
            .await
        {
            Ok(report) => {
                self.registry.record_hash(device_id, report.config_hash).await;
                Ok(report)
            }
            Err(e) => {
                if e.is_timeout() {
                    self.registry.mark_unreachable(device_id).await;
                }
                Err(e)
            }
        }
    }

    /// Make the device match `snapshot`, skipping the round trip when the hashes already agree
    pub async fn sync_to_device(&self, device_id: &str, snapshot: &ConfigSnapshot) -> SyncOutcome {
        let lock = self.lock_for(device_id).await;
        let _guard = lock.lock().await;

        let Some(device) = self.registry.get(device_id).await else {
            return SyncOutcome::UnknownDevice;
        };
        let hash = snapshot.hash();
        if device.last_config_hash == hash {
            tracing::debug!("{} already at {}", device_id, hash);
            return SyncOutcome::AlreadyInSync { hash };
        }
        self.push(&device, snapshot).await
    }

    /// Send `snapshot` regardless of hashes, for changes the hash does not cover such as secrets
    pub async fn push_to_device(&self, device_id: &str, snapshot: &ConfigSnapshot) -> SyncOutcome {
        let lock = self.lock_for(device_id).await;
        let _guard = lock.lock().await;

        match self.registry.get(device_id).await {
            Some(device) => self.push(&device, snapshot).await,
            None => SyncOutcome::UnknownDevice,
        }
    }

    /// Sync every live device independently; one failure does not hold up the others
    pub async fn sync_all_devices(
        self: &Arc<Self>,
        snapshot: &ConfigSnapshot,
    ) -> Vec<(String, SyncOutcome)> {
        let snapshot = Arc::new(snapshot.clone());
        let mut tasks = JoinSet::new();
        for device in self.registry.get_discovered_devices().await {
            let coordinator = Arc::clone(self);
            let snapshot = Arc::clone(&snapshot);
            tasks.spawn(async move {
                let id = device.identity.device_id;
                let outcome = coordinator.sync_to_device(&id, &snapshot).await;
                (id, outcome)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Sync task failed: {}", e),
            }
        }
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        outcomes
    }

    /// Expire stale registry records and forget their sync locks
    pub async fn sweep_expired(&self, now: OffsetDateTime) -> Vec<String> {
        let expired = self.registry.sweep_expired(now).await;

        let mut in_flight = self.in_flight.lock().await;
        let mut stale = Vec::new();
        for id in in_flight.keys() {
            if self.registry.get(id).await.is_none() {
                stale.push(id.clone());
            }
        }
        for id in stale {
            // A sync still holding the lock keeps its entry until the next sweep
            if in_flight.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                in_flight.remove(&id);
            }
        }
        expired
    }

    async fn push(&self, device: &DiscoveredDevice, snapshot: &ConfigSnapshot) -> SyncOutcome {
        let device_id = device.identity.device_id.as_str();
        let full = ConfigPatch::from_snapshot(snapshot).with_device_id(device_id);

        let (patch, partial) =
            match encode_within(&SyncRequest::SetConfig(full.clone()), self.max_payload) {
                Err(TransportError::MessageTooLarge(size)) => {
                    tracing::warn!(
                        "Configuration for {} is {} bytes, sending network settings only",
                        device_id,
                        size
                    );
                    (full.network_only(), true)
                }
                _ => (full, false),
            };

        match self.transport.set_config(device.ip, &patch).await {
            Ok(result) => {
                self.registry.record_hash(device_id, result.config_hash).await;
                if !result.success {
                    tracing::warn!("{} rejected configuration: {}", device_id, result.message);
                    SyncOutcome::Rejected {
                        message: result.message,
                    }
                } else if partial {
                    SyncOutcome::PartiallyApplied {
                        hash: result.config_hash,
                    }
                } else {
                    tracing::info!("{} updated to {}", device_id, result.config_hash);
                    SyncOutcome::Updated {
                        hash: result.config_hash,
                    }
                }
            }
            Err(Error::TooLarge { size }) => SyncOutcome::Rejected {
                message: format!("Network settings alone are {} bytes", size),
            },
            Err(e) => {
                tracing::warn!("Sync to {} failed: {}", device_id, e);
                self.registry.mark_unreachable(device_id).await;
                SyncOutcome::Unreachable
            }
        }
    }

    async fn device(&self, device_id: &str) -> Result<DiscoveredDevice> {
        self.registry
            .get(device_id)
            .await
            .ok_or_else(|| Error::not_found(format!("device {}", device_id)))
    }

    async fn lock_for(&self, device_id: &str) -> Arc<Mutex<()>> {
        let mut in_flight = self.in_flight.lock().await;
        Arc::clone(in_flight.entry(device_id.to_string()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use patcom_api::message::{DeviceAnnouncement, UpdateResult};
    use patcom_api::{ActionType, DeviceType, PARAM_URL};

    use super::*;

    #[derive(Clone, Copy)]
    enum Answer {
        Accept,
        Refuse,
        Silent,
    }

    /// Records every request and answers per device address
    struct CountingTransport {
        answers: HashMap<IpAddr, Answer>,
        gets: StdMutex<Vec<IpAddr>>,
        sets: StdMutex<Vec<ConfigPatch>>,
        delay: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CountingTransport {
        fn new(answers: &[(u8, Answer)]) -> Self {
            Self {
                answers: answers.iter().map(|&(last, a)| (ip(last), a)).collect(),
                gets: StdMutex::new(Vec::new()),
                sets: StdMutex::new(Vec::new()),
                delay: Duration::ZERO,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Most `set_config` requests ever outstanding at once
        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        fn sets(&self) -> Vec<ConfigPatch> {
            self.sets.lock().unwrap().clone()
        }

        fn answer(&self, device_ip: IpAddr) -> Answer {
            self.answers.get(&device_ip).copied().unwrap_or(Answer::Silent)
        }
    }

    #[async_trait]
    impl ConfigSyncTransport for CountingTransport {
        async fn get_config(&self, device_ip: IpAddr, device_id: &str) -> Result<ConfigReport> {
            self.gets.lock().unwrap().push(device_ip);
            match self.answer(device_ip) {
                Answer::Silent => Err(Error::timeout("config_response")),
                _ => {
                    let mut snapshot = ConfigSnapshot::default();
                    snapshot.identity.device_id = device_id.to_string();
                    snapshot.identity.device_name = "Remote".into();
                    Ok(snapshot.report())
                }
            }
        }

        async fn set_config(&self, device_ip: IpAddr, patch: &ConfigPatch) -> Result<UpdateResult> {
            self.sets.lock().unwrap().push(patch.clone());
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            match self.answer(device_ip) {
                Answer::Accept => {
                    let mut snapshot = ConfigSnapshot::default();
                    patch
                        .apply_to(&mut snapshot)
                        .map_err(|e| Error::serialization(e.to_string()))?;
                    Ok(UpdateResult::ok("Configuration updated", snapshot.hash()))
                }
                Answer::Refuse => Ok(UpdateResult::failed("Device ID mismatch", ConfigHash(7))),
                Answer::Silent => Err(Error::timeout("config_update_response")),
            }
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    fn announcement(id: &str, hash: ConfigHash) -> DeviceAnnouncement {
        DeviceAnnouncement {
            device_id: id.into(),
            device_name: "PATCOM".into(),
            device_type: DeviceType::ButtonMatrix,
            version: "2.1.0".into(),
            ip: String::new(),
            mac: String::new(),
            battery: 8.2,
            uptime: 5000,
            config_hash: hash,
            wifi_rssi: -55,
        }
    }

    fn desired() -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.identity.device_name = "Hallway".into();
        snapshot.network.ssid = "home".into();
        snapshot.network.password = "hunter2".into();
        snapshot.buttons[0].action = ActionType::Http;
        snapshot.buttons[0]
            .params
            .insert(PARAM_URL, "http://hub.local/scene/0")
            .unwrap();
        snapshot
    }

    async fn coordinator(
        transport: CountingTransport,
        devices: &[(&str, u8, ConfigHash)],
        max_payload: usize,
    ) -> Arc<Coordinator<CountingTransport>> {
        let registry = Arc::new(DeviceRegistry::default());
        for &(id, last, hash) in devices {
            registry
                .on_discovery_response(announcement(id, hash), SocketAddr::new(ip(last), 12345))
                .await;
        }
        Arc::new(Coordinator::new(registry, Arc::new(transport), max_payload))
    }

    #[tokio::test]
    async fn test_matching_hash_sends_nothing() {
        let snapshot = desired();
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept)]),
            &[("PATCOM-A", 10, snapshot.hash())],
            2048,
        )
        .await;

        let outcome = coordinator.sync_to_device("PATCOM-A", &snapshot).await;

        assert_eq!(outcome, SyncOutcome::AlreadyInSync { hash: snapshot.hash() });
        assert!(coordinator.transport().sets().is_empty());
    }

    #[tokio::test]
    async fn test_mismatch_pushes_full_patch_and_records_hash() {
        let snapshot = desired();
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept)]),
            &[("PATCOM-A", 10, ConfigHash(0x1a2b))],
            2048,
        )
        .await;

        let outcome = coordinator.sync_to_device("PATCOM-A", &snapshot).await;

        let sets = coordinator.transport().sets();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].device_id.as_deref(), Some("PATCOM-A"));
        assert!(!sets[0].is_network_only());

        let SyncOutcome::Updated { hash } = outcome else {
            panic!("unexpected outcome {:?}", outcome);
        };
        let record = coordinator.registry().get("PATCOM-A").await.unwrap();
        assert_eq!(record.last_config_hash, hash);
        assert!(record.reachable);
    }

    #[tokio::test]
    async fn test_push_ignores_matching_hash() {
        let snapshot = desired();
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept)]),
            &[("PATCOM-A", 10, snapshot.hash())],
            2048,
        )
        .await;

        let outcome = coordinator.push_to_device("PATCOM-A", &snapshot).await;

        assert!(matches!(outcome, SyncOutcome::Updated { .. }));
        assert_eq!(coordinator.transport().sets().len(), 1);
    }

    #[tokio::test]
    async fn test_silent_device_is_unreachable_but_kept() {
        let coordinator = coordinator(
            CountingTransport::new(&[]),
            &[("PATCOM-A", 10, ConfigHash(1))],
            2048,
        )
        .await;

        let outcome = coordinator.sync_to_device("PATCOM-A", &desired()).await;

        assert_eq!(outcome, SyncOutcome::Unreachable);
        let record = coordinator.registry().get("PATCOM-A").await.unwrap();
        assert!(!record.reachable);
        assert_eq!(record.last_config_hash, ConfigHash(1));
    }

    #[tokio::test]
    async fn test_refusal_is_reported() {
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Refuse)]),
            &[("PATCOM-A", 10, ConfigHash(1))],
            2048,
        )
        .await;

        let outcome = coordinator.sync_to_device("PATCOM-A", &desired()).await;

        assert_eq!(
            outcome,
            SyncOutcome::Rejected {
                message: "Device ID mismatch".into()
            }
        );
        let record = coordinator.registry().get("PATCOM-A").await.unwrap();
        assert_eq!(record.last_config_hash, ConfigHash(7));
    }

    #[tokio::test]
    async fn test_oversized_patch_falls_back_to_network() {
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept)]),
            &[("PATCOM-A", 10, ConfigHash(1))],
            200,
        )
        .await;

        let outcome = coordinator.sync_to_device("PATCOM-A", &desired()).await;

        assert!(matches!(outcome, SyncOutcome::PartiallyApplied { .. }));
        let sets = coordinator.transport().sets();
        assert_eq!(sets.len(), 1);
        assert!(sets[0].is_network_only());
        assert_eq!(sets[0].device_id.as_deref(), Some("PATCOM-A"));
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let coordinator = coordinator(CountingTransport::new(&[]), &[], 2048).await;

        assert_eq!(
            coordinator.sync_to_device("PATCOM-X", &desired()).await,
            SyncOutcome::UnknownDevice
        );
        assert!(matches!(
            coordinator.fetch_config("PATCOM-X").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_config_records_hash() {
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept)]),
            &[("PATCOM-A", 10, ConfigHash(1))],
            2048,
        )
        .await;

        let report = coordinator.fetch_config("PATCOM-A").await.unwrap();

        assert_eq!(report.device_id, "PATCOM-A");
        assert_eq!(report.device.name, "Remote");
        let record = coordinator.registry().get("PATCOM-A").await.unwrap();
        assert_eq!(record.last_config_hash, report.config_hash);
    }

    #[tokio::test]
    async fn test_concurrent_syncs_to_one_device_are_serialized() {
        let snapshot = desired();
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept)]).slow(Duration::from_millis(50)),
            &[("PATCOM-A", 10, ConfigHash(1))],
            2048,
        )
        .await;

        let (first, second) = tokio::join!(
            coordinator.sync_to_device("PATCOM-A", &snapshot),
            coordinator.sync_to_device("PATCOM-A", &snapshot),
        );

        assert_eq!(coordinator.transport().peak(), 1);
        assert_eq!(coordinator.transport().sets().len(), 1);
        // Whichever waited sees the hash recorded by the other
        let mut outcomes = [first, second];
        outcomes.sort_by_key(|outcome| matches!(outcome, SyncOutcome::AlreadyInSync { .. }));
        assert!(matches!(outcomes[0], SyncOutcome::Updated { .. }));
        assert_eq!(outcomes[1], SyncOutcome::AlreadyInSync { hash: snapshot.hash() });
    }

    #[tokio::test]
    async fn test_pushes_to_different_devices_overlap() {
        let snapshot = desired();
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept), (11, Answer::Accept)])
                .slow(Duration::from_millis(50)),
            &[("PATCOM-A", 10, ConfigHash(1)), ("PATCOM-B", 11, ConfigHash(1))],
            2048,
        )
        .await;

        tokio::join!(
            coordinator.push_to_device("PATCOM-A", &snapshot),
            coordinator.push_to_device("PATCOM-B", &snapshot),
        );

        assert_eq!(coordinator.transport().peak(), 2);
    }

    #[tokio::test]
    async fn test_sweep_forgets_locks_of_expired_devices() {
        let snapshot = desired();
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept)]),
            &[("PATCOM-A", 10, ConfigHash(1))],
            2048,
        )
        .await;
        coordinator.sync_to_device("PATCOM-A", &snapshot).await;
        coordinator.sync_to_device("PATCOM-GONE", &snapshot).await;
        assert_eq!(coordinator.in_flight.lock().await.len(), 2);

        let expired = coordinator
            .sweep_expired(OffsetDateTime::now_utc() + time::Duration::minutes(10))
            .await;

        assert_eq!(expired, ["PATCOM-A"]);
        assert!(coordinator.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_all_isolates_failures() {
        let snapshot = desired();
        let coordinator = coordinator(
            CountingTransport::new(&[(10, Answer::Accept), (12, Answer::Accept)]),
            &[
                ("PATCOM-A", 10, ConfigHash(1)),
                ("PATCOM-B", 11, ConfigHash(2)),
                ("PATCOM-C", 12, snapshot.hash()),
            ],
            2048,
        )
        .await;

        let outcomes = coordinator.sync_all_devices(&snapshot).await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].0, "PATCOM-A");
        assert!(matches!(outcomes[0].1, SyncOutcome::Updated { .. }));
        assert_eq!(outcomes[1], ("PATCOM-B".to_string(), SyncOutcome::Unreachable));
        assert_eq!(
            outcomes[2],
            (
                "PATCOM-C".to_string(),
                SyncOutcome::AlreadyInSync { hash: snapshot.hash() }
            )
        );
        assert_eq!(coordinator.transport().sets().len(), 2);
    }
}

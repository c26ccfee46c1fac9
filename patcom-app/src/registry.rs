use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use patcom_api::message::DeviceAnnouncement;
use patcom_api::{ConfigHash, DeviceIdentity};

/// Records not refreshed for this long are dropped
pub const DEFAULT_TTL: Duration = Duration::seconds(120);

/// Coordinator copy of what a device last said about itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveredDevice {
    pub identity: DeviceIdentity,
    /// Source address of the last announcement
    pub ip: IpAddr,
    pub mac: String,
    pub last_config_hash: ConfigHash,
    /// Volts
    pub battery: f32,
    pub uptime_ms: u64,
    pub wifi_rssi: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
    /// False after the last request to the device timed out
    pub reachable: bool,
}

/// Live devices keyed by device id
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DiscoveredDevice>>,
    ttl: Duration,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl DeviceRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn on_discovery_response(
        &self,
        announcement: DeviceAnnouncement,
        source: SocketAddr,
    ) -> DiscoveredDevice {
        self.upsert_at(announcement, source, OffsetDateTime::now_utc())
            .await
    }

    /// Insert or overwrite the record of the announcing device
    pub async fn upsert_at(
        &self,
        announcement: DeviceAnnouncement,
        source: SocketAddr,
        now: OffsetDateTime,
    ) -> DiscoveredDevice {
        let record = DiscoveredDevice {
            identity: DeviceIdentity {
                device_id: announcement.device_id,
                device_name: announcement.device_name,
                device_type: announcement.device_type,
                firmware_version: announcement.version,
            },
            ip: source.ip(),
            mac: announcement.mac,
            last_config_hash: announcement.config_hash,
            battery: announcement.battery,
            uptime_ms: announcement.uptime,
            wifi_rssi: announcement.wifi_rssi,
            last_seen: now,
            reachable: true,
        };

        let mut devices = self.devices.write().await;
        match devices.insert(record.identity.device_id.clone(), record.clone()) {
            None => tracing::info!(
                "Discovered {} ({}) at {}",
                record.identity.device_id,
                record.identity.device_name,
                record.ip
            ),
            Some(previous) if previous.ip != record.ip => tracing::info!(
                "{} moved from {} to {}",
                record.identity.device_id,
                previous.ip,
                record.ip
            ),
            Some(_) => {}
        }
        record
    }

    /// Remove every record older than the TTL and return their ids
    pub async fn sweep_expired(&self, now: OffsetDateTime) -> Vec<String> {
        let mut devices = self.devices.write().await;
        let expired: Vec<String> = devices
            .values()
            .filter(|device| now - device.last_seen > self.ttl)
            .map(|device| device.identity.device_id.clone())
            .collect();
        for id in &expired {
            devices.remove(id);
            tracing::info!("{} expired", id);
        }
        expired
    }

    /// Every live record, sorted by device id
    pub async fn get_discovered_devices(&self) -> Vec<DiscoveredDevice> {
        self.devices_at(OffsetDateTime::now_utc()).await
    }

    pub async fn devices_at(&self, now: OffsetDateTime) -> Vec<DiscoveredDevice> {
        self.sweep_expired(now).await;
        let mut devices: Vec<DiscoveredDevice> =
            self.devices.read().await.values().cloned().collect();
        devices.sort_by(|a, b| a.identity.device_id.cmp(&b.identity.device_id));
        devices
    }

    /// Records refreshed at or after `since`
    pub async fn seen_since(&self, since: OffsetDateTime) -> Vec<DiscoveredDevice> {
        let mut devices: Vec<DiscoveredDevice> = self
            .devices
            .read()
            .await
            .values()
            .filter(|device| device.last_seen >= since)
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.identity.device_id.cmp(&b.identity.device_id));
        devices
    }

    pub async fn get(&self, device_id: &str) -> Option<DiscoveredDevice> {
        self.devices.read().await.get(device_id).cloned()
    }

    /// Keep the record until the TTL sweep but remember the last attempt failed
    pub async fn mark_unreachable(&self, device_id: &str) {
        if let Some(device) = self.devices.write().await.get_mut(device_id) {
            device.reachable = false;
        }
    }

    /// Store the hash a device reported in a sync answer
    pub async fn record_hash(&self, device_id: &str, hash: ConfigHash) {
        if let Some(device) = self.devices.write().await.get_mut(device_id) {
            device.last_config_hash = hash;
            device.reachable = true;
        }
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

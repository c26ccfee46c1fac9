use alloc::string::String;

use patcom_api::message::{
    DeviceAnnouncement, DeviceInfo, EventKind, Heartbeat, IdentifyInfo,
};
use patcom_api::{ConfigSnapshot, DeviceIdentity};

use crate::action::{DEFAULT_DISPATCH_TIMEOUT_MS, DispatchEnv};
use crate::input::ButtonTiming;
use crate::storage::{ConfigStore, LocalStorage};

use super::platform::WifiStatus;
use super::power::PowerSettings;

/// Timing of the control loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSettings {
    pub timing: ButtonTiming,
    pub dispatch_timeout_ms: u64,
    pub announce_interval_ms: u64,
    pub restart_delay_ms: u64,
    pub power: PowerSettings,
    pub poll_interval_ms: u64,
    pub low_power_poll_interval_ms: u64,
    pub critical_poll_interval_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            timing: ButtonTiming::default(),
            dispatch_timeout_ms: DEFAULT_DISPATCH_TIMEOUT_MS,
            announce_interval_ms: 30_000,
            restart_delay_ms: 3_000,
            power: PowerSettings::default(),
            poll_interval_ms: 10,
            low_power_poll_interval_ms: 50,
            critical_poll_interval_ms: 100,
        }
    }
}

/// State shared by every component of the loop, owned by the loop and lent out per call
pub struct DeviceContext<S> {
    pub store: ConfigStore<S>,
    pub wifi: WifiStatus,
    /// Volts, refreshed every tick
    pub supply_voltage: f32,
    /// Milliseconds since boot
    pub now: u64,
    pub low_power: bool,
    pub settings: DeviceSettings,
    pending_restart_at: Option<u64>,
}

impl<S> DeviceContext<S>
where
    S: LocalStorage,
{
    pub fn new(store: ConfigStore<S>, settings: DeviceSettings) -> Self {
        Self {
            store,
            wifi: WifiStatus::disconnected(),
            supply_voltage: 0.0,
            now: 0,
            low_power: false,
            settings,
            pending_restart_at: None,
        }
    }

    pub fn config(&self) -> &ConfigSnapshot {
        self.store.current()
    }

    pub fn identity(&self) -> &DeviceIdentity {
        self.store.identity()
    }

    pub fn online(&self) -> bool {
        self.wifi.connected
    }

    /// No usable network; the device only listens on serial
    pub fn config_mode(&self) -> bool {
        !self.config().network.has_credentials() || !self.wifi.connected
    }

    /// Restart after the configured delay unless one is already scheduled
    pub fn schedule_restart(&mut self) {
        if self.pending_restart_at.is_none() {
            log::info!(
                "Network configuration changed, restarting in {} ms",
                self.settings.restart_delay_ms
            );
            self.pending_restart_at = Some(self.now + self.settings.restart_delay_ms);
        }
    }

    pub fn restart_pending(&self) -> bool {
        self.pending_restart_at.is_some()
    }

    pub fn restart_due(&self) -> bool {
        self.pending_restart_at.is_some_and(|at| self.now >= at)
    }

    pub fn dispatch_env(&self) -> DispatchEnv<'_> {
        DispatchEnv {
            identity: self.identity(),
            credentials: &self.config().credentials,
            supply_voltage: self.supply_voltage,
            timestamp: self.now,
            online: self.online(),
        }
    }

    pub fn identify_info(&self, connection: &str) -> IdentifyInfo {
        let identity = self.identity();
        IdentifyInfo {
            device_id: identity.device_id.clone(),
            device_name: identity.device_name.clone(),
            version: identity.firmware_version.clone(),
            device_type: identity.device_type,
            connection: String::from(connection),
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        let identity = self.identity();
        DeviceInfo {
            device_id: identity.device_id.clone(),
            device: identity.device_name.clone(),
            version: identity.firmware_version.clone(),
            uptime: self.now,
            battery: self.supply_voltage,
            wifi: self.wifi.report(),
            config_mode: self.config_mode(),
            low_power: self.low_power,
            config_hash: self.store.current_hash(),
        }
    }

    pub fn announcement(&self) -> DeviceAnnouncement {
        let identity = self.identity();
        DeviceAnnouncement {
            device_id: identity.device_id.clone(),
            device_name: identity.device_name.clone(),
            device_type: identity.device_type,
            version: identity.firmware_version.clone(),
            ip: self.wifi.ip_string(),
            mac: self.wifi.mac.clone(),
            battery: self.supply_voltage,
            uptime: self.now,
            config_hash: self.store.current_hash(),
            wifi_rssi: self.wifi.rssi,
        }
    }

    pub fn heartbeat(&self) -> Heartbeat {
        let identity = self.identity();
        Heartbeat {
            kind: EventKind::Heartbeat,
            device: identity.device_name.clone(),
            version: identity.firmware_version.clone(),
            uptime: self.now,
            battery: self.supply_voltage,
            wifi: self.wifi.connected,
            ip: self.wifi.ip_string(),
        }
    }
}

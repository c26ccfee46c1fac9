use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::hash::ConfigHash;
use crate::models::DeviceType;

/// Messages exchanged on the discovery port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryMessage {
    /// Coordinator broadcast asking every device to identify itself
    DiscoverDevices {
        #[serde(default)]
        timestamp: u64,
    },
    /// Unsolicited periodic announcement
    DeviceDiscovery(DeviceAnnouncement),
    /// Unicast reply to a discovery broadcast
    DeviceResponse(DeviceAnnouncement),
}

impl DiscoveryMessage {
    pub fn announcement(&self) -> Option<&DeviceAnnouncement> {
        match self {
            Self::DeviceDiscovery(a) | Self::DeviceResponse(a) => Some(a),
            Self::DiscoverDevices { .. } => None,
        }
    }

    pub fn into_announcement(self) -> Option<DeviceAnnouncement> {
        match self {
            Self::DeviceDiscovery(a) | Self::DeviceResponse(a) => Some(a),
            Self::DiscoverDevices { .. } => None,
        }
    }
}

/// Identity summary, current hash and live metrics of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAnnouncement {
    pub device_id: String,
    pub device_name: String,
    #[serde(default)]
    pub device_type: DeviceType,
    /// Firmware version
    pub version: String,
    /// Address as seen by the device itself
    pub ip: String,
    #[serde(default)]
    pub mac: String,
    /// Supply voltage in volts
    #[serde(default)]
    pub battery: f32,
    /// Milliseconds since boot
    #[serde(default)]
    pub uptime: u64,
    pub config_hash: ConfigHash,
    #[serde(default)]
    pub wifi_rssi: i32,
}

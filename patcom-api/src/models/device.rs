use alloc::format;
use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::FIRMWARE_VERSION;

pub const DEFAULT_DEVICE_NAME: &str = "PATCOM";
pub const MAX_DEVICE_NAME_LEN: usize = 31;
pub const DEFAULT_BRIGHTNESS: u8 = 255;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u32 = 5000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// 8-button input panel
    #[default]
    ButtonMatrix,
    /// Panel wired to switch mains outlets
    OutletController,
    /// Anything else speaking the protocol
    Custom,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::ButtonMatrix => "button_matrix",
            DeviceType::OutletController => "outlet_controller",
            DeviceType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    /// Stable identifier derived from the hardware address
    pub device_id: String,
    /// User-visible name, the only writable identity field
    pub device_name: String,
    pub device_type: DeviceType,
    pub firmware_version: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            device_name: String::from(DEFAULT_DEVICE_NAME),
            device_type: DeviceType::default(),
            firmware_version: String::from(FIRMWARE_VERSION),
        }
    }
}

impl DeviceIdentity {
    pub fn for_hardware(hardware_id: u64) -> Self {
        Self {
            device_id: device_id_from_hardware(hardware_id),
            ..Default::default()
        }
    }
}

/// `PATCOM-` followed by the hardware address in upper-case hex
pub fn device_id_from_hardware(hardware_id: u64) -> String {
    format!("PATCOM-{:X}", hardware_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicePreferences {
    /// Button LED duty, 0-255
    pub brightness: u8,
    /// Answer discovery requests and announce periodically
    pub discoverable: bool,
    /// Serial heartbeat period, 0 disables
    pub heartbeat_interval_ms: u32,
}

impl Default for DevicePreferences {
    fn default() -> Self {
        Self {
            brightness: DEFAULT_BRIGHTNESS,
            discoverable: true,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_from_hardware() {
        assert_eq!(device_id_from_hardware(0xabc), "PATCOM-ABC");
        assert_eq!(DeviceIdentity::for_hardware(0x1f).device_id, "PATCOM-1F");
    }

    #[test]
    fn test_device_type_wire_names() {
        let json = serde_json::to_string(&DeviceType::OutletController).unwrap();
        assert_eq!(json, "\"outlet_controller\"");
        assert_eq!(DeviceType::ButtonMatrix.as_str(), "button_matrix");
    }

    #[test]
    fn test_preferences_fill_missing_fields() {
        let prefs: DevicePreferences = serde_json::from_str(r#"{"brightness":10}"#).unwrap();
        assert_eq!(prefs.brightness, 10);
        assert!(prefs.discoverable);
        assert_eq!(prefs.heartbeat_interval_ms, DEFAULT_HEARTBEAT_INTERVAL_MS);
    }
}

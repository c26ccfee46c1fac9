use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::BUTTON_COUNT;
use crate::hash::ConfigHash;

use super::{ButtonSlot, Credentials, DeviceIdentity, DevicePreferences, DeviceType, NetworkConfig};

/// Complete device configuration, owned by the device.
///
/// Any field missing from a stored document takes its default, so loading an
/// older or partial document never fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigSnapshot {
    pub identity: DeviceIdentity,
    pub preferences: DevicePreferences,
    pub network: NetworkConfig,
    #[serde(with = "button_array")]
    pub buttons: [ButtonSlot; BUTTON_COUNT],
    pub credentials: Credentials,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            identity: DeviceIdentity::default(),
            preferences: DevicePreferences::default(),
            network: NetworkConfig::default(),
            buttons: default_buttons(),
            credentials: Credentials::new(),
        }
    }
}

fn default_buttons() -> [ButtonSlot; BUTTON_COUNT] {
    core::array::from_fn(|i| ButtonSlot::new(i as u8))
}

impl ConfigSnapshot {
    pub fn for_device(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            ..Default::default()
        }
    }

    pub fn button(&self, id: u8) -> Option<&ButtonSlot> {
        self.buttons.get(id as usize)
    }

    pub fn hash(&self) -> ConfigHash {
        ConfigHash::of(self)
    }

    /// View of the configuration that is safe to hand to remote readers
    pub fn report(&self) -> ConfigReport {
        ConfigReport {
            device_id: self.identity.device_id.clone(),
            config_hash: self.hash(),
            device: DeviceView {
                name: self.identity.device_name.clone(),
                device_type: self.identity.device_type,
                version: self.identity.firmware_version.clone(),
                brightness: self.preferences.brightness,
                discoverable: self.preferences.discoverable,
                heartbeat_interval_ms: self.preferences.heartbeat_interval_ms,
            },
            network: NetworkView {
                ssid: self.network.ssid.clone(),
                static_ip: self.network.static_ip,
                ip: self.network.ip.clone(),
                subnet: self.network.subnet.clone(),
                gateway: self.network.gateway.clone(),
                dns: self.network.dns.clone(),
            },
            buttons: self
                .buttons
                .iter()
                .map(|button| ButtonSlot {
                    params: button.params.redacted(),
                    ..button.clone()
                })
                .collect(),
            credentials: self.credentials.names().map(String::from).collect(),
        }
    }
}

/// Redacted configuration: no WiFi passphrase, blank webhook secrets and
/// header values, and credential names only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigReport {
    pub device_id: String,
    pub config_hash: ConfigHash,
    pub device: DeviceView,
    pub network: NetworkView,
    pub buttons: Vec<ButtonSlot>,
    #[serde(default)]
    pub credentials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceView {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    #[serde(default)]
    pub version: String,
    pub brightness: u8,
    pub discoverable: bool,
    #[serde(default)]
    pub heartbeat_interval_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkView {
    pub ssid: String,
    #[serde(rename = "staticIP")]
    pub static_ip: bool,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub dns: String,
}

impl ConfigReport {
    /// Rebuild a coordinator-side working copy.
    ///
    /// Secrets are unknown to the reader, so the passphrase, secret button
    /// parameters and every credential value come back blank. Pushing the copy back keeps the device's stored secrets.
    pub fn to_snapshot(&self) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();

        snapshot.identity.device_id = self.device_id.clone();
        snapshot.identity.device_name = self.device.name.clone();
        snapshot.identity.device_type = self.device.device_type;
        if !self.device.version.is_empty() {
            snapshot.identity.firmware_version = self.device.version.clone();
        }

        snapshot.preferences = DevicePreferences {
            brightness: self.device.brightness,
            discoverable: self.device.discoverable,
            heartbeat_interval_ms: self.device.heartbeat_interval_ms,
        };

        snapshot.network = NetworkConfig {
            ssid: self.network.ssid.clone(),
            password: String::new(),
            static_ip: self.network.static_ip,
            ip: self.network.ip.clone(),
            subnet: self.network.subnet.clone(),
            gateway: self.network.gateway.clone(),
            dns: self.network.dns.clone(),
        };

        place_buttons(&mut snapshot.buttons, self.buttons.iter().cloned());

        for name in &self.credentials {
            // Names that violate the table limits cannot come from a well-formed device
            let _ = snapshot.credentials.insert(name.as_str(), "");
        }

        snapshot
    }
}

/// Put each slot at its own index, ignoring out-of-range ids
pub(crate) fn place_buttons<I>(buttons: &mut [ButtonSlot; BUTTON_COUNT], slots: I)
where
    I: IntoIterator<Item = ButtonSlot>,
{
    for mut slot in slots {
        if let Some(target) = buttons.get_mut(slot.id as usize) {
            slot.normalize();
            *target = slot;
        }
    }
}

mod button_array {
    use super::*;

    pub fn serialize<S>(buttons: &[ButtonSlot; BUTTON_COUNT], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        buttons.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[ButtonSlot; BUTTON_COUNT], D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = Vec::<ButtonSlot>::deserialize(deserializer)?;
        let mut buttons = default_buttons();
        place_buttons(&mut buttons, stored);
        Ok(buttons)
    }
}

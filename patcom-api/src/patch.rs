//! Partial configuration updates carried by `set_config` and `SET_CONFIG`.
//!
//! Sections that are absent leave the stored configuration untouched. Inside
//! `device` and `network` every absent field is also left untouched, which is
//! how a coordinator copy without the WiFi passphrase can be pushed back
//! safely. Listed buttons are replaced wholesale and their absent fields take
//! factory values, so a sender may drop default-valued button fields.

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::BUTTON_COUNT;
use crate::models::{
    ActionParams, ActionType, ButtonSlot, ConfigSnapshot, Credentials, MAX_DEVICE_NAME_LEN,
    NetworkConfig, default_enabled, place_buttons,
};
use crate::validation::ValidationError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    /// Target device, required on the UDP path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DevicePatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ButtonPatch>>,
    /// Replaces the whole table; blank values keep the stored secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoverable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_ms: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, rename = "staticIP", skip_serializing_if = "Option::is_none")]
    pub static_ip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
}

/// Wire form of a button: absent fields mean factory values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonPatch {
    pub id: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "ActionType::is_none")]
    pub action: ActionType,
    #[serde(default, rename = "config", skip_serializing_if = "ActionParams::is_empty")]
    pub params: ActionParams,
    #[serde(default = "default_enabled", skip_serializing_if = "is_true")]
    pub enabled: bool,
}

fn is_true(value: &bool) -> bool {
    *value
}

impl ButtonPatch {
    pub fn from_slot(slot: &ButtonSlot) -> Self {
        let name = if slot.name == ButtonSlot::default_name(slot.id) {
            None
        } else {
            Some(slot.name.clone())
        };

        Self {
            id: slot.id,
            name,
            action: slot.action,
            params: slot.params.clone(),
            enabled: slot.enabled,
        }
    }

    pub fn into_slot(self) -> ButtonSlot {
        ButtonSlot {
            id: self.id,
            name: self.name.unwrap_or_else(|| ButtonSlot::default_name(self.id)),
            action: self.action,
            params: self.params,
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchOutcome {
    /// Network settings differ from before; the device must restart to use them
    pub network_changed: bool,
}

fn some_if_set(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(String::from(value))
    }
}

impl ConfigPatch {
    /// Full patch that makes a device match `snapshot`, with default button fields dropped
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        Self {
            device_id: some_if_set(&snapshot.identity.device_id),
            device: Some(DevicePatch {
                name: Some(snapshot.identity.device_name.clone()),
                brightness: Some(snapshot.preferences.brightness),
                discoverable: Some(snapshot.preferences.discoverable),
                heartbeat_interval_ms: Some(snapshot.preferences.heartbeat_interval_ms),
            }),
            network: Some(NetworkPatch::from_config(&snapshot.network)),
            buttons: Some(snapshot.buttons.iter().map(ButtonPatch::from_slot).collect()),
            credentials: Some(snapshot.credentials.clone()),
        }
    }

    /// Reduced patch used when the full document does not fit the device buffer
    pub fn network_only(&self) -> Self {
        Self {
            device_id: self.device_id.clone(),
            network: self.network.clone(),
            ..Default::default()
        }
    }

    pub fn is_network_only(&self) -> bool {
        self.device.is_none() && self.buttons.is_none() && self.credentials.is_none()
    }

    pub fn with_device_id<S: Into<String>>(mut self, device_id: S) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Reject patches that can never apply, before anything is touched
    pub fn check(&self) -> Result<(), ValidationError> {
        if let Some(buttons) = &self.buttons {
            if let Some(bad) = buttons.iter().find(|b| b.id as usize >= BUTTON_COUNT) {
                return Err(ValidationError::ButtonOutOfRange { button: bad.id });
            }
        }
        Ok(())
    }

    /// Apply to `snapshot` as a single step. On error the snapshot is unchanged.
    pub fn apply_to(&self, snapshot: &mut ConfigSnapshot) -> Result<PatchOutcome, ValidationError> {
        self.check()?;

        let network_before = snapshot.network.clone();

        if let Some(device) = &self.device {
            if let Some(name) = device.name.as_deref().filter(|name| !name.is_empty()) {
                let mut name = String::from(name);
                if let Some((index, _)) = name.char_indices().nth(MAX_DEVICE_NAME_LEN) {
                    name.truncate(index);
                }
                snapshot.identity.device_name = name;
            }
            if let Some(brightness) = device.brightness {
                snapshot.preferences.brightness = brightness;
            }
            if let Some(discoverable) = device.discoverable {
                snapshot.preferences.discoverable = discoverable;
            }
            if let Some(interval) = device.heartbeat_interval_ms {
                snapshot.preferences.heartbeat_interval_ms = interval;
            }
        }

        if let Some(network) = &self.network {
            network.apply_to(&mut snapshot.network);
        }

        if let Some(buttons) = &self.buttons {
            let slots: Vec<ButtonSlot> = buttons
                .iter()
                .cloned()
                .map(|patch| {
                    let mut slot = patch.into_slot();
                    if let Some(stored) = snapshot.button(slot.id) {
                        slot.params.keep_secrets_from(&stored.params);
                    }
                    slot
                })
                .collect();
            place_buttons(&mut snapshot.buttons, slots);
        }

        if let Some(credentials) = &self.credentials {
            snapshot.credentials.merge_from(credentials);
        }

        Ok(PatchOutcome {
            network_changed: snapshot.network != network_before,
        })
    }
}

impl NetworkPatch {
    pub fn from_config(network: &NetworkConfig) -> Self {
        Self {
            ssid: Some(network.ssid.clone()),
            password: some_if_set(&network.password),
            static_ip: Some(network.static_ip),
            ip: Some(network.ip.clone()),
            subnet: Some(network.subnet.clone()),
            gateway: Some(network.gateway.clone()),
            dns: Some(network.dns.clone()),
        }
    }

    fn apply_to(&self, network: &mut NetworkConfig) {
        let fields = [
            (&self.ssid, &mut network.ssid),
            (&self.password, &mut network.password),
            (&self.ip, &mut network.ip),
            (&self.subnet, &mut network.subnet),
            (&self.gateway, &mut network.gateway),
            (&self.dns, &mut network.dns),
        ];
        for (incoming, stored) in fields {
            if let Some(value) = incoming {
                *stored = value.clone();
            }
        }
        if let Some(static_ip) = self.static_ip {
            network.static_ip = static_ip;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::PARAM_URL;

    use super::*;

    fn stored() -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        snapshot.identity.device_id = "PATCOM-ABC".into();
        snapshot.network.ssid = "home".into();
        snapshot.network.password = "hunter2".into();
        snapshot.credentials.insert("token", "abc").unwrap();
        snapshot.buttons[6].name = "Keep me".into();
        snapshot
    }

    #[test]
    fn test_absent_password_is_kept() {
        let mut snapshot = stored();
        let patch: ConfigPatch =
            serde_json::from_str(r#"{"network":{"ssid":"office","staticIP":false}}"#).unwrap();

        let outcome = patch.apply_to(&mut snapshot).unwrap();

        assert!(outcome.network_changed);
        assert_eq!(snapshot.network.ssid, "office");
        assert_eq!(snapshot.network.password, "hunter2");
    }

    #[test]
    fn test_listed_buttons_replaced_with_defaults() {
        let mut snapshot = stored();
        snapshot.buttons[2].name = "Old".into();
        snapshot.buttons[2].enabled = false;

        let patch: ConfigPatch = serde_json::from_str(
            r#"{"buttons":[{"id":2,"action":"http","config":{"url":"http://hub/2"}}]}"#,
        )
        .unwrap();
        let outcome = patch.apply_to(&mut snapshot).unwrap();

        assert!(!outcome.network_changed);
        assert_eq!(snapshot.buttons[2].name, "Button 2");
        assert!(snapshot.buttons[2].enabled);
        assert_eq!(snapshot.buttons[2].params.get(PARAM_URL), Some("http://hub/2"));
        assert_eq!(snapshot.buttons[6].name, "Keep me");
    }

    #[test]
    fn test_blank_button_secret_keeps_stored_value() {
        let mut snapshot = stored();
        snapshot.buttons[1].action = ActionType::Webhook;
        snapshot.buttons[1].params.insert(PARAM_URL, "https://hooks/1").unwrap();
        snapshot.buttons[1].params.insert(crate::models::PARAM_SECRET, "shh").unwrap();

        let patch: ConfigPatch = serde_json::from_str(
            r#"{"buttons":[{"id":1,"action":"webhook","config":{"url":"https://hooks/2","secret":""}}]}"#,
        )
        .unwrap();
        patch.apply_to(&mut snapshot).unwrap();

        assert_eq!(snapshot.buttons[1].params.get(PARAM_URL), Some("https://hooks/2"));
        assert_eq!(snapshot.buttons[1].params.get(crate::models::PARAM_SECRET), Some("shh"));
    }

    #[test]
    fn test_out_of_range_button_rejects_whole_patch() {
        let mut snapshot = stored();
        let before = snapshot.clone();
        let patch: ConfigPatch = serde_json::from_str(
            r#"{"device":{"name":"New"},"buttons":[{"id":8,"name":"Nine"}]}"#,
        )
        .unwrap();

        assert_eq!(
            patch.apply_to(&mut snapshot),
            Err(ValidationError::ButtonOutOfRange { button: 8 })
        );
        assert_eq!(snapshot, before);
    }

    #[test]
    fn test_from_snapshot_compacts_default_buttons() {
        let snapshot = stored();
        let json = serde_json::to_string(&ConfigPatch::from_snapshot(&snapshot)).unwrap();

        assert!(json.contains(r#"{"id":0}"#));
        assert!(json.contains("Keep me"));
        assert!(json.contains("hunter2"));
        assert!(json.contains(r#""device_id":"PATCOM-ABC""#));
    }

    #[test]
    fn test_from_snapshot_reproduces_hash() {
        let mut source = stored();
        source.identity.device_name = "Studio".into();
        source.preferences.brightness = 40;
        source.buttons[0].action = ActionType::Webhook;
        source.buttons[0]
            .params
            .insert(PARAM_URL, "https://hooks/0")
            .unwrap();

        let mut target = ConfigSnapshot::default();
        ConfigPatch::from_snapshot(&source)
            .apply_to(&mut target)
            .unwrap();

        assert_eq!(target.hash(), source.hash());
    }

    #[test]
    fn test_network_only_drops_other_sections() {
        let patch = ConfigPatch::from_snapshot(&stored()).network_only();
        assert!(patch.is_network_only());
        assert!(patch.network.is_some());
        assert_eq!(patch.device_id.as_deref(), Some("PATCOM-ABC"));
    }

    #[test]
    fn test_unchanged_network_reports_no_change() {
        let mut snapshot = stored();
        let patch = ConfigPatch {
            network: Some(NetworkPatch::from_config(&snapshot.network)),
            ..Default::default()
        };
        assert!(!patch.apply_to(&mut snapshot).unwrap().network_changed);
    }
}

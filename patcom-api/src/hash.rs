use core::fmt;
use core::str::FromStr;

use alloc::string::String;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{ActionParams, ConfigSnapshot};

const FIELD_SEPARATOR: u8 = 0x1f;

/// Content hash of the non-secret part of a configuration.
///
/// A wrapping `h * 31 + byte` fold over every field in a fixed order, with a
/// separator between fields. It is an equality oracle for sync decisions, not a
/// collision-resistant digest. Rendered as lower-case hex on the wire.
///
/// Covered: device name and type, preferences, network settings without the
/// passphrase, every button, and credential names. The device id and firmware
/// version are read-only identity and are left out, as are all secret values,
/// including webhook secrets and header parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConfigHash(pub u32);

struct Fold(u32);

impl Fold {
    fn bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_mul(31).wrapping_add(b as u32);
        }
        self.0 = self.0.wrapping_mul(31).wrapping_add(FIELD_SEPARATOR as u32);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn flag(&mut self, value: bool) {
        self.bytes(if value { b"1" } else { b"0" });
    }

    fn number(&mut self, value: u32) {
        self.bytes(&value.to_be_bytes());
    }
}

impl ConfigHash {
    pub fn of(snapshot: &ConfigSnapshot) -> Self {
        let mut fold = Fold(0);

        fold.str(&snapshot.identity.device_name);
        fold.str(snapshot.identity.device_type.as_str());

        fold.number(snapshot.preferences.brightness as u32);
        fold.flag(snapshot.preferences.discoverable);
        fold.number(snapshot.preferences.heartbeat_interval_ms);

        let network = &snapshot.network;
        fold.str(&network.ssid);
        fold.flag(network.static_ip);
        fold.str(&network.ip);
        fold.str(&network.subnet);
        fold.str(&network.gateway);
        fold.str(&network.dns);

        for button in &snapshot.buttons {
            fold.number(button.id as u32);
            fold.str(&button.name);
            fold.str(button.action.as_str());
            fold.number(button.params.len() as u32);
            for (key, value) in button.params.iter() {
                fold.str(key);
                if !ActionParams::is_secret_key(key) {
                    fold.str(value);
                }
            }
            fold.flag(button.enabled);
        }

        fold.number(snapshot.credentials.len() as u32);
        for name in snapshot.credentials.names() {
            fold.str(name);
        }

        Self(fold.0)
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl FromStr for ConfigHash {
    type Err = core::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u32::from_str_radix(s.trim(), 16).map(ConfigHash)
    }
}

impl Serialize for ConfigHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConfigHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

use core::net::Ipv4Addr;

use alloc::string::String;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DNS: &str = "8.8.8.8";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// WiFi network name
    pub ssid: String,
    /// WiFi passphrase, never reported remotely
    pub password: String,
    /// Use the fixed addressing below instead of DHCP
    #[serde(rename = "staticIP")]
    pub static_ip: bool,
    pub ip: String,
    pub subnet: String,
    pub gateway: String,
    pub dns: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            static_ip: false,
            ip: String::new(),
            subnet: String::new(),
            gateway: String::new(),
            dns: String::from(DEFAULT_DNS),
        }
    }
}

/// Parsed static addressing, only produced when every required field is valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAddress {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub dns: Ipv4Addr,
}

impl NetworkConfig {
    pub fn has_credentials(&self) -> bool {
        !self.ssid.is_empty()
    }

    /// Forget the joined network. Addressing is kept.
    pub fn clear_credentials(&mut self) {
        self.ssid.clear();
        self.password.clear();
    }

    /// Addressing to apply, or `None` to fall back to DHCP
    pub fn static_address(&self) -> Option<StaticAddress> {
        if !self.static_ip {
            return None;
        }

        let ip = self.ip.parse().ok()?;
        let gateway = self.gateway.parse().ok()?;
        let subnet = self
            .subnet
            .parse()
            .unwrap_or(Ipv4Addr::new(255, 255, 255, 0));
        let dns = self.dns.parse().unwrap_or(Ipv4Addr::new(8, 8, 8, 8));

        Some(StaticAddress {
            ip,
            gateway,
            subnet,
            dns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_ip_wire_name() {
        let json = serde_json::to_value(NetworkConfig::default()).unwrap();
        assert_eq!(json["staticIP"], false);
        assert_eq!(json["dns"], DEFAULT_DNS);
    }

    #[test]
    fn test_static_address_requires_valid_ip_and_gateway() {
        let mut network = NetworkConfig {
            static_ip: true,
            ip: "192.168.1.50".into(),
            gateway: "192.168.1.1".into(),
            ..Default::default()
        };
        let address = network.static_address().unwrap();
        assert_eq!(address.ip, Ipv4Addr::new(192, 168, 1, 50));
        assert_eq!(address.subnet, Ipv4Addr::new(255, 255, 255, 0));

        network.gateway = "192.168.1".into();
        assert_eq!(network.static_address(), None);

        network.gateway = "192.168.1.1".into();
        network.static_ip = false;
        assert_eq!(network.static_address(), None);
    }

    #[test]
    fn test_clear_credentials_keeps_addressing() {
        let mut network = NetworkConfig {
            ssid: "home".into(),
            password: "secret".into(),
            static_ip: true,
            ip: "10.0.0.2".into(),
            ..Default::default()
        };
        network.clear_credentials();
        assert!(!network.has_credentials());
        assert!(network.password.is_empty());
        assert_eq!(network.ip, "10.0.0.2");
    }
}

use core::net::Ipv4Addr;

use alloc::format;
use alloc::string::String;

use patcom_api::StaticAddress;
use patcom_api::message::WifiReport;

/// Link state reported by the WiFi stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiStatus {
    pub connected: bool,
    pub ssid: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub rssi: i32,
    pub mac: String,
}

impl Default for WifiStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl WifiStatus {
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ssid: String::new(),
            ip: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            rssi: 0,
            mac: String::new(),
        }
    }

    /// Directed broadcast address of the attached subnet
    pub fn broadcast_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.ip) | !u32::from(self.netmask))
    }

    pub fn report(&self) -> WifiReport {
        WifiReport {
            connected: self.connected,
            ssid: self.ssid.clone(),
            ip: self.ip_string(),
            rssi: self.rssi,
        }
    }

    pub fn ip_string(&self) -> String {
        if self.connected {
            format!("{}", self.ip)
        } else {
            String::new()
        }
    }
}

/// Board services the control loop needs besides pins and sockets
pub trait Platform {
    /// Stable identifier burned into the chip, used to derive the device id
    fn hardware_id(&self) -> u64;

    /// Supply voltage in volts
    fn supply_voltage(&mut self) -> f32;

    fn wifi_status(&self) -> WifiStatus;

    /// Join `ssid`, with fixed addressing or DHCP when `address` is `None`
    fn join_network(&mut self, ssid: &str, password: &str, address: Option<StaticAddress>);

    fn restart(&mut self);

    /// Enter deep sleep until a button wakes the board
    fn deep_sleep(&mut self);
}

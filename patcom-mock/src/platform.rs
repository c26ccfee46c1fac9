use std::convert::Infallible;
use std::net::{Ipv4Addr, UdpSocket};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

use patcom_embedded::{Platform, StaticAddress, WifiStatus};

/// The host machine playing the board
pub struct HostPlatform {
    hardware_id: u64,
    supply_voltage: f32,
    restart_requested: bool,
}

impl HostPlatform {
    pub fn new(hardware_id: u64, supply_voltage: f32) -> Self {
        Self {
            hardware_id,
            supply_voltage,
            restart_requested: false,
        }
    }

    /// Clears the request
    pub fn take_restart(&mut self) -> bool {
        std::mem::take(&mut self.restart_requested)
    }
}

impl Platform for HostPlatform {
    fn hardware_id(&self) -> u64 {
        self.hardware_id
    }

    fn supply_voltage(&mut self) -> f32 {
        self.supply_voltage
    }

    fn wifi_status(&self) -> WifiStatus {
        match outbound_ipv4() {
            Some(ip) => WifiStatus {
                connected: true,
                ssid: String::from("host"),
                ip,
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                rssi: -40,
                mac: mac_from_hardware(self.hardware_id),
            },
            None => WifiStatus::disconnected(),
        }
    }

    fn join_network(&mut self, ssid: &str, _password: &str, address: Option<StaticAddress>) {
        // The host keeps its own link; only the request is visible
        match address {
            Some(address) => tracing::info!(
                "Joining {} as {} via {} (dns {})",
                ssid,
                address.ip,
                address.gateway,
                address.dns
            ),
            None => tracing::info!("Joining {} with DHCP", ssid),
        }
    }

    fn restart(&mut self) {
        tracing::info!("Restart requested");
        self.restart_requested = true;
    }

    fn deep_sleep(&mut self) {
        tracing::info!("Deep sleep requested, staying awake on the host");
    }
}

/// Address the host would use to leave the machine. Connecting a UDP socket sends nothing.
fn outbound_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)).ok()?;
    match socket.local_addr().ok()?.ip() {
        std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

fn mac_from_hardware(hardware_id: u64) -> String {
    let bytes = hardware_id.to_be_bytes();
    bytes[2..]
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Button line nobody presses
#[derive(Default)]
pub struct IdlePin;

impl ErrorType for IdlePin {
    type Error = Infallible;
}

impl InputPin for IdlePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}

/// LED channel that only remembers its duty
#[derive(Default)]
pub struct VirtualLed {
    duty: u16,
}

impl VirtualLed {
    pub fn duty(&self) -> u16 {
        self.duty
    }
}

impl pwm::ErrorType for VirtualLed {
    type Error = Infallible;
}

impl SetDutyCycle for VirtualLed {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty = duty;
        Ok(())
    }
}

/// Status indicator
#[derive(Default)]
pub struct VirtualLamp {
    on: bool,
}

impl VirtualLamp {
    pub fn is_on(&self) -> bool {
        self.on
    }
}

impl ErrorType for VirtualLamp {
    type Error = Infallible;
}

impl OutputPin for VirtualLamp {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.on = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.on = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_uses_low_six_bytes() {
        assert_eq!(mac_from_hardware(0xA1B2C3D4), "00:00:A1:B2:C3:D4");
    }

    #[test]
    fn test_restart_request_is_taken_once() {
        let mut platform = HostPlatform::new(1, 8.2);
        platform.restart();

        assert!(platform.take_restart());
        assert!(!platform.take_restart());
    }
}

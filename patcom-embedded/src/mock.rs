//! Stand-ins for hardware and network collaborators, shared by unit tests.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::net::{Ipv4Addr, SocketAddrV4};

use embedded_hal_nb::nb;
use embedded_hal_nb::serial::{Read, Write};

use patcom_api::StaticAddress;

use crate::action::{HttpClient, HttpRequest, HttpResponse};
use crate::device::{DeviceContext, DeviceSettings, Platform, WifiStatus};
use crate::error::Error;
use crate::network::DatagramSocket;
use crate::storage::{ConfigStore, MemoryStorage};

pub const HARDWARE_ID: u64 = 0xabc;

pub fn home_wifi() -> WifiStatus {
    WifiStatus {
        connected: true,
        ssid: "home".into(),
        ip: Ipv4Addr::new(192, 168, 4, 20),
        netmask: Ipv4Addr::new(255, 255, 255, 0),
        rssi: -55,
        mac: "24:6F:28:00:00:01".into(),
    }
}

pub async fn online_context() -> DeviceContext<MemoryStorage> {
    let store = ConfigStore::open(MemoryStorage::new(), HARDWARE_ID).await;
    let mut ctx = DeviceContext::new(store, DeviceSettings::default());
    ctx.wifi = home_wifi();
    ctx
}

#[derive(Default)]
pub struct MockSerial {
    incoming: VecDeque<u8>,
    sent_data: RefCell<Vec<u8>>,
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive(&mut self, text: &str) {
        self.incoming.extend(text.bytes());
    }

    pub fn sent_lines(&self) -> Vec<String> {
        let data = self.sent_data.borrow();
        String::from_utf8_lossy(&data)
            .lines()
            .map(String::from)
            .collect()
    }
}

impl embedded_hal_nb::serial::ErrorType for MockSerial {
    type Error = Error;
}

impl Read<u8> for MockSerial {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.incoming.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

impl Write<u8> for MockSerial {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.sent_data.borrow_mut().push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSocket {
    pub sent: Vec<(SocketAddrV4, Vec<u8>)>,
}

impl MockSocket {
    pub fn messages<T: for<'de> serde::Deserialize<'de>>(&self) -> Vec<(SocketAddrV4, T)> {
        self.sent
            .iter()
            .map(|(to, data)| (*to, serde_json::from_slice(data).unwrap()))
            .collect()
    }
}

impl DatagramSocket for MockSocket {
    type Error = Infallible;

    async fn send_to(&mut self, data: &[u8], target: SocketAddrV4) -> Result<(), Self::Error> {
        self.sent.push((target, data.to_vec()));
        Ok(())
    }
}

/// Answers every request with a fixed status
pub struct MockHttp {
    pub status: u16,
    pub sent: Vec<HttpRequest>,
}

impl MockHttp {
    pub fn answering(status: u16) -> Self {
        Self {
            status,
            sent: Vec::new(),
        }
    }
}

impl HttpClient for MockHttp {
    type Error = Infallible;

    async fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, Self::Error> {
        self.sent.push(request.clone());
        Ok(HttpResponse {
            status: self.status,
        })
    }
}

/// Button line whose level the test holds on to. Pressed pulls low.
#[derive(Clone, Default)]
pub struct MockButton {
    pressed: Rc<Cell<bool>>,
}

impl MockButton {
    pub fn press(&self, pressed: bool) {
        self.pressed.set(pressed);
    }
}

impl embedded_hal::digital::ErrorType for MockButton {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for MockButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pressed.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pressed.get())
    }
}

#[derive(Default)]
pub struct MockPwm {
    pub duty: u16,
}

impl embedded_hal::pwm::ErrorType for MockPwm {
    type Error = Infallible;
}

impl embedded_hal::pwm::SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        255
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty = duty;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockOutput {
    pub high: bool,
}

impl embedded_hal::digital::ErrorType for MockOutput {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for MockOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

pub struct MockPlatform {
    pub wifi: WifiStatus,
    pub voltage: f32,
    pub restarts: usize,
    pub sleeps: usize,
    pub joined: Vec<(String, Option<StaticAddress>)>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            wifi: home_wifi(),
            voltage: 8.4,
            restarts: 0,
            sleeps: 0,
            joined: Vec::new(),
        }
    }
}

impl Platform for MockPlatform {
    fn hardware_id(&self) -> u64 {
        HARDWARE_ID
    }

    fn supply_voltage(&mut self) -> f32 {
        self.voltage
    }

    fn wifi_status(&self) -> WifiStatus {
        self.wifi.clone()
    }

    fn join_network(&mut self, ssid: &str, _password: &str, address: Option<StaticAddress>) {
        self.joined.push((String::from(ssid), address));
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn deep_sleep(&mut self) {
        self.sleeps += 1;
    }
}

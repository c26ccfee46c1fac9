use std::error::Error;
use std::net::SocketAddrV4;
use std::time::{Duration, Instant};

use patcom_embedded::device::{Device, DeviceIo};
use patcom_embedded::network::{PacketChannel, PacketQueue};
use patcom_embedded::DeviceSettings;

use crate::http::ReqwestClient;
use crate::platform::{HostPlatform, IdlePin, VirtualLamp, VirtualLed};
use crate::serial::StdioSerial;
use crate::settings::Settings;
use crate::socket::UdpEndpoint;
use crate::storage::FileStorage;

pub mod http;
pub mod platform;
pub mod serial;
pub mod settings;
pub mod socket;
pub mod storage;

static QUEUE: PacketQueue = PacketQueue::new();

/// Run a simulated panel on this machine until the process is stopped.
///
/// The configuration lives in a file, the serial console is stdin/stdout and
/// the UDP ports are real, so a coordinator on the LAN sees a normal device.
pub async fn run(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let mock = &settings.mock;
    let discovery = UdpEndpoint::bind(
        SocketAddrV4::new(mock.bind, mock.discovery_port),
        PacketChannel::Discovery,
        &QUEUE,
    )
    .await?;
    let config = UdpEndpoint::bind(
        SocketAddrV4::new(mock.bind, mock.config_port),
        PacketChannel::Config,
        &QUEUE,
    )
    .await?;
    let serial = StdioSerial::spawn();

    loop {
        let io = DeviceIo {
            buttons: Default::default(),
            leds: Default::default(),
            status_led: VirtualLamp::default(),
            serial: serial.clone(),
            http: ReqwestClient::new()?,
            discovery_socket: discovery.clone(),
            config_socket: config.clone(),
        };
        let platform = HostPlatform::new(mock.hardware_id, mock.supply_voltage);
        let storage = FileStorage::new(&mock.storage_path);

        let mut device: Device<'_, _, IdlePin, VirtualLed, _, _, _, _, _> =
            Device::start(storage, io, platform, &QUEUE, DeviceSettings::default()).await;

        let boot = Instant::now();
        loop {
            device.tick(boot.elapsed().as_millis() as u64).await;
            if device.platform_mut().take_restart() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(device.poll_interval())).await;
        }
        tracing::info!("Rebooting simulated device");
    }
}

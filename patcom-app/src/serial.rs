use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serialport::{SerialPort, available_ports};

use patcom_api::message::{
    CommandResponse, DeviceInfo, IdentifyInfo, SerialCommand, SerialTag, split_line,
};
use patcom_api::{ConfigPatch, ConfigReport};

use crate::error::{Error, Result};
use crate::settings::Serial;

/// Request/response client for the USB serial link of one device
pub struct SerialClient<P> {
    port: P,
    buffer: Vec<u8>,
    timeout: Duration,
}

impl SerialClient<Box<dyn SerialPort>> {
    /// Open the configured port, or the first one found
    pub fn open(serial: &Serial) -> Result<Self> {
        let port_path = match &serial.port_path {
            Some(path) => path.clone(),
            None => available_ports()?
                .first()
                .map(|port| port.port_name.clone())
                .ok_or_else(|| Error::serial("No serial port found"))?,
        };

        tracing::debug!("Connect to port: {}", port_path);

        let port = serialport::new(&port_path, serial.baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;

        Ok(Self::new(port, Duration::from_millis(serial.timeout_ms)))
    }
}

impl<P> SerialClient<P>
where
    P: Read + Write,
{
    pub fn new(port: P, timeout: Duration) -> Self {
        Self {
            port,
            buffer: Vec::new(),
            timeout,
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn send(&mut self, command: &SerialCommand) -> Result<()> {
        let line = format!("{}\n", command.to_line());
        self.port.write_all(line.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    /// Next complete line, or `None` once `deadline` passes
    pub fn read_line(&mut self, deadline: Instant) -> Result<Option<String>> {
        let mut chunk = [0u8; 256];
        loop {
            if let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buffer.drain(..=end).collect();
                let line = String::from_utf8_lossy(&raw).trim_end().to_string();
                return Ok(Some(line));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            match self.port.read(&mut chunk) {
                Ok(0) => std::thread::sleep(Duration::from_millis(5)),
                Ok(n) => self.buffer.extend_from_slice(&chunk[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Send `command` and wait for the first line tagged `expect`. Log output and
    /// unrelated lines such as events and heartbeats are skipped.
    pub fn request<T: DeserializeOwned>(&mut self, command: SerialCommand, expect: SerialTag) -> Result<T> {
        self.send(&command)?;
        let deadline = Instant::now() + self.timeout;
        while let Some(line) = self.read_line(deadline)? {
            match split_line(&line) {
                Some((tag, payload)) if tag == expect => {
                    return Ok(serde_json::from_str(payload)?);
                }
                Some((tag, _)) => tracing::trace!("Skipping {} line", tag.as_str()),
                None => tracing::debug!("device: {}", line),
            }
        }
        Err(Error::timeout(expect.as_str()))
    }

    pub fn identify(&mut self) -> Result<IdentifyInfo> {
        self.request(SerialCommand::Identify, SerialTag::Identify)
    }

    pub fn status(&mut self) -> Result<DeviceInfo> {
        self.request(SerialCommand::Status, SerialTag::DeviceInfo)
    }

    pub fn config(&mut self) -> Result<ConfigReport> {
        self.request(SerialCommand::Config, SerialTag::Config)
    }

    pub fn set_config(&mut self, patch: &ConfigPatch) -> Result<CommandResponse> {
        let payload = serde_json::to_string(patch)?;
        self.request(SerialCommand::SetConfig(payload), SerialTag::Response)
    }

    pub fn test_button(&mut self, button: u8) -> Result<CommandResponse> {
        self.request(SerialCommand::Test(button), SerialTag::Response)
    }

    /// The device restarts straight away and sends no answer
    pub fn reset_wifi(&mut self) -> Result<()> {
        self.send(&SerialCommand::ResetWifi)
    }

    pub fn wifi(&mut self) -> Result<CommandResponse> {
        self.request(SerialCommand::Wifi, SerialTag::Response)
    }

    pub fn battery(&mut self) -> Result<CommandResponse> {
        self.request(SerialCommand::Battery, SerialTag::Response)
    }
}

//! Line protocol of the USB serial link.
//!
//! Requests are single keyword lines, some with a `:argument`. Device output
//! is one `TAG:payload` line per response, event or heartbeat.

use core::fmt;

use alloc::format;
use alloc::string::{String, ToString};

use serde::{Deserialize, Serialize};

use crate::BUTTON_COUNT;
use crate::hash::ConfigHash;
use crate::models::DeviceType;
use crate::transport::{JsonSerializer, Serializer, TransportError};

/// Longest request line the device buffers
pub const MAX_LINE_LEN: usize = 2048 + 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialCommand {
    Identify,
    Status,
    Config,
    /// Raw JSON payload, parsed by the receiver so a bad document can be reported
    SetConfig(String),
    Test(u8),
    ResetWifi,
    Wifi,
    Battery,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    Empty,
    Unknown(String),
    InvalidButton(String),
}

impl fmt::Display for CommandParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty command"),
            Self::Unknown(line) => write!(f, "Unknown command: {}", line),
            Self::InvalidButton(arg) => write!(f, "Invalid button index: {}", arg),
        }
    }
}

impl SerialCommand {
    pub const HELP_TEXT: &'static str =
        "IDENTIFY, STATUS, CONFIG, SET_CONFIG:<json>, TEST:<0-7>, RESET_WIFI, WIFI, BATTERY, HELP";

    /// Parse one request line. The keyword is case-insensitive; the argument is kept verbatim.
    pub fn parse(line: &str) -> Result<Self, CommandParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(CommandParseError::Empty);
        }

        let (keyword, argument) = match line.split_once(':') {
            Some((keyword, argument)) => (keyword.trim(), Some(argument.trim())),
            None => (line, None),
        };

        match (keyword.to_ascii_uppercase().as_str(), argument) {
            ("IDENTIFY", None) => Ok(Self::Identify),
            ("STATUS", None) => Ok(Self::Status),
            ("CONFIG", None) => Ok(Self::Config),
            ("SET_CONFIG", Some(payload)) => Ok(Self::SetConfig(payload.to_string())),
            ("TEST", Some(index)) => index
                .parse::<u8>()
                .ok()
                .filter(|n| (*n as usize) < BUTTON_COUNT)
                .map(Self::Test)
                .ok_or_else(|| CommandParseError::InvalidButton(index.to_string())),
            ("RESET_WIFI", None) => Ok(Self::ResetWifi),
            ("WIFI", None) => Ok(Self::Wifi),
            ("BATTERY", None) => Ok(Self::Battery),
            ("HELP", None) => Ok(Self::Help),
            _ => Err(CommandParseError::Unknown(line.to_string())),
        }
    }

    /// Request line without the terminating newline
    pub fn to_line(&self) -> String {
        match self {
            Self::Identify => "IDENTIFY".to_string(),
            Self::Status => "STATUS".to_string(),
            Self::Config => "CONFIG".to_string(),
            Self::SetConfig(payload) => format!("SET_CONFIG:{}", payload),
            Self::Test(index) => format!("TEST:{}", index),
            Self::ResetWifi => "RESET_WIFI".to_string(),
            Self::Wifi => "WIFI".to_string(),
            Self::Battery => "BATTERY".to_string(),
            Self::Help => "HELP".to_string(),
        }
    }
}

/// Prefix identifying the kind of a device output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialTag {
    Identify,
    DeviceInfo,
    Config,
    Response,
    Event,
    Heartbeat,
    Battery,
}

impl SerialTag {
    const ALL: [SerialTag; 7] = [
        SerialTag::Identify,
        SerialTag::DeviceInfo,
        SerialTag::Config,
        SerialTag::Response,
        SerialTag::Event,
        SerialTag::Heartbeat,
        SerialTag::Battery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SerialTag::Identify => "IDENTIFY",
            SerialTag::DeviceInfo => "DEVICE_INFO",
            SerialTag::Config => "CONFIG",
            SerialTag::Response => "RESPONSE",
            SerialTag::Event => "EVENT",
            SerialTag::Heartbeat => "HEARTBEAT",
            SerialTag::Battery => "BATTERY",
        }
    }
}

/// Render `TAG:<json>` without the terminating newline
pub fn encode_line<T: Serialize>(tag: SerialTag, payload: &T) -> Result<String, TransportError> {
    let body = JsonSerializer::serialize(payload)?;
    let body = String::from_utf8(body).map_err(|e| TransportError::Serialization(e.to_string()))?;
    Ok(format!("{}:{}", tag.as_str(), body))
}

/// Split a device output line into its tag and payload. Untagged lines are log output.
pub fn split_line(line: &str) -> Option<(SerialTag, &str)> {
    let (prefix, payload) = line.trim_end().split_once(':')?;
    SerialTag::ALL
        .into_iter()
        .find(|tag| tag.as_str() == prefix)
        .map(|tag| (tag, payload))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyInfo {
    pub device_id: String,
    pub device_name: String,
    pub version: String,
    pub device_type: DeviceType,
    /// Link the answer came over
    pub connection: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiReport {
    pub connected: bool,
    pub ssid: String,
    pub ip: String,
    pub rssi: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device: String,
    pub version: String,
    pub uptime: u64,
    pub battery: f32,
    pub wifi: WifiReport,
    /// No usable network; the device waits for configuration over serial
    pub config_mode: bool,
    pub low_power: bool,
    pub config_hash: ConfigHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    ConfigUpload,
    Test,
    Wifi,
    Battery,
    Help,
    Error,
}

/// Success/failure/message triple answering a serial request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub success: bool,
    pub message: String,
    pub timestamp: u64,
}

impl CommandResponse {
    pub fn new<S: Into<String>>(kind: ResponseKind, success: bool, message: S, timestamp: u64) -> Self {
        Self {
            kind,
            success,
            message: message.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ButtonPress,
    Heartbeat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub button: u8,
    pub name: String,
    pub timestamp: u64,
}

impl ButtonEvent {
    pub fn press<S: Into<String>>(button: u8, name: S, timestamp: u64) -> Self {
        Self {
            kind: EventKind::ButtonPress,
            button,
            name: name.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub device: String,
    pub version: String,
    pub uptime: u64,
    pub battery: f32,
    pub wifi: bool,
    pub ip: String,
}

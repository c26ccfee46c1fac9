use core::fmt;
use core::net::Ipv4Addr;

use alloc::vec::Vec;

use crate::message::SyncResponse;
use crate::models::{ButtonSlot, ConfigSnapshot, MAX_BUTTON_NAME_LEN};
use crate::transport::{MAX_DOCUMENT_SIZE, TransportError, encode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    Ip,
    Gateway,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Static addressing enabled with an unparseable address
    InvalidStaticAddress(AddressField),
    /// HTTP or webhook action without a target
    MissingUrl { button: u8 },
    /// Target is not an http(s) URL
    InvalidUrl { button: u8 },
    /// Button name longer than allowed
    NameTooLong { button: u8 },
    /// Button id outside the fixed slots
    ButtonOutOfRange { button: u8 },
    /// Bounded table is full
    TooManyEntries { limit: usize },
    /// Table key or value exceeds its length limit
    EntryTooLong { limit: usize },
    /// The configuration report would not fit one document
    DocumentTooLarge { size: usize, limit: usize },
}

impl ValidationError {
    /// Button the error is scoped to, if any
    pub fn button(&self) -> Option<u8> {
        match self {
            Self::MissingUrl { button }
            | Self::InvalidUrl { button }
            | Self::NameTooLong { button }
            | Self::ButtonOutOfRange { button } => Some(*button),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStaticAddress(AddressField::Ip) => write!(f, "Invalid static IP address"),
            Self::InvalidStaticAddress(AddressField::Gateway) => {
                write!(f, "Invalid gateway address")
            }
            Self::MissingUrl { button } => write!(f, "Missing URL for button {}", button),
            Self::InvalidUrl { button } => write!(f, "Invalid URL for button {}", button),
            Self::NameTooLong { button } => write!(f, "Name too long for button {}", button),
            Self::ButtonOutOfRange { button } => write!(f, "Button {} out of range", button),
            Self::TooManyEntries { limit } => write!(f, "More than {} entries", limit),
            Self::EntryTooLong { limit } => write!(f, "Entry longer than {} characters", limit),
            Self::DocumentTooLarge { size, limit } => {
                write!(f, "Configuration too large: {} bytes, limit {}", size, limit)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ValidationError {}

pub fn is_valid_ipv4(text: &str) -> bool {
    text.parse::<Ipv4Addr>().is_ok()
}

pub fn is_valid_url(text: &str) -> bool {
    let rest = text
        .strip_prefix("http://")
        .or_else(|| text.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.is_empty())
}

/// Check one button. Invalid buttons are stored as-is and behave as `None` when pressed.
pub fn validate_button(button: &ButtonSlot) -> Option<ValidationError> {
    if button.name.chars().count() > MAX_BUTTON_NAME_LEN {
        return Some(ValidationError::NameTooLong { button: button.id });
    }
    if !button.action.needs_url() {
        return None;
    }
    match button.url() {
        None => Some(ValidationError::MissingUrl { button: button.id }),
        Some(url) if !is_valid_url(url) => Some(ValidationError::InvalidUrl { button: button.id }),
        Some(_) => None,
    }
}

/// Every problem in the snapshot, in field order. An empty list means fully valid.
pub fn validate(snapshot: &ConfigSnapshot) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if snapshot.network.static_ip {
        if !is_valid_ipv4(&snapshot.network.ip) {
            errors.push(ValidationError::InvalidStaticAddress(AddressField::Ip));
        }
        if !is_valid_ipv4(&snapshot.network.gateway) {
            errors.push(ValidationError::InvalidStaticAddress(AddressField::Gateway));
        }
    }

    errors.extend(snapshot.buttons.iter().filter_map(validate_button));
    errors
}

/// A stored configuration must always fit its own `config_response`
pub fn check_report_size(snapshot: &ConfigSnapshot) -> Result<(), ValidationError> {
    match encode(&SyncResponse::ConfigResponse(snapshot.report())) {
        Err(TransportError::MessageTooLarge(size)) => Err(ValidationError::DocumentTooLarge {
            size,
            limit: MAX_DOCUMENT_SIZE,
        }),
        _ => Ok(()),
    }
}

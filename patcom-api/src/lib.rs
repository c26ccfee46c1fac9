#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod hash;
pub mod message;
pub mod models;
pub mod patch;
pub mod transport;
pub mod validation;

pub use hash::ConfigHash;
pub use models::*;
pub use patch::{ButtonPatch, ConfigPatch, DevicePatch, NetworkPatch, PatchOutcome};
pub use validation::ValidationError;

/// UDP port for discovery broadcasts and device announcements
pub const DISCOVERY_PORT: u16 = 12345;

/// UDP port for remote configuration requests
pub const CONFIG_PORT: u16 = 12346;

/// Firmware version reported by devices built from this crate
pub const FIRMWARE_VERSION: &str = "2.1.0";

/// Number of programmable buttons on a device
pub const BUTTON_COUNT: usize = 8;

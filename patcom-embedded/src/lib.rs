#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod action;
pub mod device;
pub mod error;
pub mod feedback;
pub mod input;
#[cfg(test)]
mod mock;
pub mod network;
pub mod serial;
pub mod storage;

pub use device::{Device, DeviceContext, DeviceSettings, Platform, WifiStatus};
pub use error::*;
pub use patcom_api::StaticAddress;

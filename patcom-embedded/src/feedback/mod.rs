mod led;
mod status;

pub use led::{ButtonLeds, ERROR_FLASH_MS, ERROR_FLASHES};
pub use status::{StatusLed, StatusMode};

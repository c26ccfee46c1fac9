mod context;
mod platform;
mod power;
mod runtime;

pub use context::{DeviceContext, DeviceSettings};
pub use platform::{Platform, WifiStatus};
pub use power::{PowerEvent, PowerManager, PowerSettings};
pub use runtime::{Device, DeviceIo};

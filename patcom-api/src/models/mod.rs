mod button;
mod credentials;
mod device;
mod network;
mod snapshot;

pub use button::{
    ActionParams, ActionType, ButtonSlot, MAX_ACTION_PARAMS, MAX_BUTTON_NAME_LEN, PARAM_BODY,
    PARAM_HEADER_PREFIX, PARAM_METHOD, PARAM_SECRET, PARAM_URL,
};
pub use credentials::{
    Credentials, MAX_CREDENTIAL_NAME_LEN, MAX_CREDENTIAL_VALUE_LEN, MAX_CREDENTIALS,
};
pub use device::{
    DEFAULT_BRIGHTNESS, DEFAULT_DEVICE_NAME, DEFAULT_HEARTBEAT_INTERVAL_MS, DeviceIdentity,
    DevicePreferences, DeviceType, MAX_DEVICE_NAME_LEN, device_id_from_hardware,
};
pub use network::{DEFAULT_DNS, NetworkConfig, StaticAddress};
pub use snapshot::{ConfigReport, ConfigSnapshot, DeviceView, NetworkView};

pub(crate) use button::default_enabled;
pub(crate) use snapshot::place_buttons;

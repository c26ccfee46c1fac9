mod discovery;
mod serial;
mod sync;

pub use discovery::{DeviceAnnouncement, DiscoveryMessage};
pub use serial::{
    ButtonEvent, CommandParseError, CommandResponse, DeviceInfo, EventKind, Heartbeat,
    IdentifyInfo, MAX_LINE_LEN, ResponseKind, SerialCommand, SerialTag, WifiReport, encode_line,
    split_line,
};
pub use sync::{SyncRequest, SyncResponse, UpdateResult};

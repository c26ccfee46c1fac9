mod config_sync;
mod discovery;
mod queue;

pub use config_sync::ConfigSyncResponder;
pub use discovery::DiscoveryResponder;
pub use queue::{InboundPacket, PACKET_QUEUE_DEPTH, PacketChannel, PacketQueue};

use core::net::SocketAddrV4;

/// Bound UDP socket. Receiving happens outside the loop and lands in a [`PacketQueue`].
#[allow(async_fn_in_trait)]
pub trait DatagramSocket {
    type Error: core::fmt::Debug;

    async fn send_to(&mut self, data: &[u8], target: SocketAddrV4) -> Result<(), Self::Error>;
}

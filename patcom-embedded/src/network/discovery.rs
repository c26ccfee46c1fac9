use core::net::SocketAddrV4;

use patcom_api::DISCOVERY_PORT;
use patcom_api::message::DiscoveryMessage;
use patcom_api::transport::{decode, encode};

use crate::device::DeviceContext;
use crate::error::{Error, Result};
use crate::storage::LocalStorage;

use super::{DatagramSocket, InboundPacket};

/// Device side of discovery: answers broadcasts and announces itself periodically
pub struct DiscoveryResponder<N> {
    socket: N,
    port: u16,
    last_announce: Option<u64>,
}

impl<N> DiscoveryResponder<N>
where
    N: DatagramSocket,
{
    pub fn new(socket: N) -> Self {
        Self::with_port(socket, DISCOVERY_PORT)
    }

    /// Announce to `port` instead of the default discovery port
    pub fn with_port(socket: N, port: u16) -> Self {
        Self {
            socket,
            port,
            last_announce: None,
        }
    }

    pub fn socket(&self) -> &N {
        &self.socket
    }

    pub async fn handle_packet<S>(&mut self, packet: &InboundPacket, ctx: &DeviceContext<S>) -> Result<()>
    where
        S: LocalStorage,
    {
        let message: DiscoveryMessage = match decode(&packet.data) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Ignoring discovery packet from {}: {}", packet.source, e);
                return Ok(());
            }
        };

        match message {
            DiscoveryMessage::DiscoverDevices { .. } => {
                if !ctx.config().preferences.discoverable || !ctx.online() {
                    return Ok(());
                }
                let response = DiscoveryMessage::DeviceResponse(ctx.announcement());
                self.send(&response, packet.source).await?;
                log::info!("Discovery response sent to {}", packet.source);
            }
            // Other devices announcing themselves
            DiscoveryMessage::DeviceDiscovery(_) | DiscoveryMessage::DeviceResponse(_) => {}
        }
        Ok(())
    }

    /// Broadcast an announcement when the interval has elapsed. Returns true if one was sent.
    pub async fn poll_announce<S>(&mut self, ctx: &DeviceContext<S>) -> Result<bool>
    where
        S: LocalStorage,
    {
        if !ctx.online() || !ctx.config().preferences.discoverable || ctx.low_power {
            return Ok(false);
        }
        let due = self
            .last_announce
            .is_none_or(|at| ctx.now.saturating_sub(at) >= ctx.settings.announce_interval_ms);
        if !due {
            return Ok(false);
        }

        self.last_announce = Some(ctx.now);
        let target = SocketAddrV4::new(ctx.wifi.broadcast_address(), self.port);
        self.send(&DiscoveryMessage::DeviceDiscovery(ctx.announcement()), target)
            .await?;
        log::debug!("Discovery broadcast sent to {}", target);
        Ok(true)
    }

    async fn send(&mut self, message: &DiscoveryMessage, target: SocketAddrV4) -> Result<()> {
        let bytes = encode(message)?;
        self.socket.send_to(&bytes, target).await.map_err(|e| {
            log::warn!("Failed to send discovery message to {}: {:?}", target, e);
            Error::NetworkError
        })
    }
}

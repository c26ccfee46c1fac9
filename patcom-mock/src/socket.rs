use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;

use tokio::net::UdpSocket;

use patcom_embedded::network::{DatagramSocket, InboundPacket, PacketChannel, PacketQueue};

const RECEIVE_BUFFER: usize = 4096;

/// Sending half of a bound UDP socket; a background task does the receiving
#[derive(Clone)]
pub struct UdpEndpoint {
    socket: Arc<UdpSocket>,
}

impl UdpEndpoint {
    /// Bind `local` and forward every datagram into `queue` tagged with `channel`
    pub async fn bind(
        local: SocketAddrV4,
        channel: PacketChannel,
        queue: &'static PacketQueue,
    ) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(local).await?);
        socket.set_broadcast(true)?;
        tracing::info!("Listening for {:?} packets on {}", channel, socket.local_addr()?);

        let receiver = socket.clone();
        tokio::spawn(async move {
            let mut buffer = [0u8; RECEIVE_BUFFER];
            loop {
                match receiver.recv_from(&mut buffer).await {
                    Ok((len, SocketAddr::V4(source))) => {
                        queue.push(InboundPacket {
                            channel,
                            source,
                            data: buffer[..len].to_vec(),
                        });
                    }
                    Ok((_, source)) => tracing::debug!("Ignoring IPv6 packet from {}", source),
                    Err(e) => {
                        tracing::error!("Receive on {:?} socket failed: {}", channel, e);
                        return;
                    }
                }
            }
        });

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramSocket for UdpEndpoint {
    type Error = io::Error;

    async fn send_to(&mut self, data: &[u8], target: SocketAddrV4) -> Result<(), Self::Error> {
        self.socket.send_to(data, target).await.map(|_| ())
    }
}

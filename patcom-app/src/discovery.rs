use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::net::UdpSocket;
use tokio::time::{Instant, timeout_at};

use patcom_api::message::DiscoveryMessage;
use patcom_api::transport::{JsonSerializer, Serializer, encode};

use crate::error::{Error, Result};
use crate::registry::{DeviceRegistry, DiscoveredDevice};

const RECEIVE_BUFFER: usize = 4096;

/// Coordinator side of discovery.
///
/// Responses and unsolicited announcements share one socket and both land in
/// the registry, whichever task happens to receive them.
pub struct DiscoveryClient {
    socket: UdpSocket,
    broadcast: SocketAddr,
    registry: Arc<DeviceRegistry>,
    generation: AtomicU64,
}

impl DiscoveryClient {
    pub async fn bind(
        local: SocketAddr,
        broadcast: SocketAddr,
        registry: Arc<DeviceRegistry>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        socket.set_broadcast(true)?;
        tracing::debug!("Discovery socket bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            broadcast,
            registry,
            generation: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Broadcast a discovery request and collect answers for `window`.
    ///
    /// Starting another sweep ends this one early; whatever arrived so far is returned.
    pub async fn discover(&self, window: Duration) -> Result<Vec<DiscoveredDevice>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let started = OffsetDateTime::now_utc();

        let request = DiscoveryMessage::DiscoverDevices {
            timestamp: (started.unix_timestamp_nanos() / 1_000_000) as u64,
        };
        self.socket
            .send_to(&encode(&request)?, self.broadcast)
            .await
            .map_err(|e| Error::network_with_source("Failed to send discovery broadcast", Box::new(e)))?;
        tracing::debug!("Discovery sweep {} sent to {}", generation, self.broadcast);

        let deadline = Instant::now() + window;
        let mut buffer = [0u8; RECEIVE_BUFFER];
        while self.generation.load(Ordering::SeqCst) == generation {
            match timeout_at(deadline, self.socket.recv_from(&mut buffer)).await {
                Ok(Ok((len, source))) => self.handle_datagram(&buffer[..len], source).await,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }

        Ok(self.registry.seen_since(started).await)
    }

    /// Receive announcements until the task is dropped
    pub async fn listen_announcements(&self) -> Result<()> {
        let mut buffer = [0u8; RECEIVE_BUFFER];
        loop {
            let (len, source) = self.socket.recv_from(&mut buffer).await?;
            self.handle_datagram(&buffer[..len], source).await;
        }
    }

    async fn handle_datagram(&self, data: &[u8], source: SocketAddr) {
        let message: DiscoveryMessage = match JsonSerializer::deserialize(data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Ignoring datagram from {}: {}", source, e);
                return;
            }
        };

        if let Some(announcement) = message.into_announcement() {
            self.registry.on_discovery_response(announcement, source).await;
        }
    }
}

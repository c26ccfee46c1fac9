use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use patcom_api::message::{SyncRequest, SyncResponse, UpdateResult};
use patcom_api::transport::{JsonSerializer, MAX_DOCUMENT_SIZE, Serializer, encode_within};
use patcom_api::{CONFIG_PORT, ConfigPatch, ConfigReport};

use crate::error::{Error, Result};

const RECEIVE_BUFFER: usize = 4096;

/// Request/response exchange with one device's config port
#[async_trait]
pub trait ConfigSyncTransport: Send + Sync {
    async fn get_config(&self, device_ip: IpAddr, device_id: &str) -> Result<ConfigReport>;

    /// Fails with [`Error::TooLarge`] when the patch does not fit the device buffer
    async fn set_config(&self, device_ip: IpAddr, patch: &ConfigPatch) -> Result<UpdateResult>;
}

/// Config sync over UDP, one fresh socket per request
pub struct UdpSyncTransport {
    port: u16,
    timeout: Duration,
    max_payload: usize,
}

impl Default for UdpSyncTransport {
    fn default() -> Self {
        Self::new(CONFIG_PORT, Duration::from_secs(3), MAX_DOCUMENT_SIZE)
    }
}

impl UdpSyncTransport {
    pub fn new(port: u16, timeout: Duration, max_payload: usize) -> Self {
        Self {
            port,
            timeout,
            max_payload,
        }
    }

    async fn exchange(&self, device_ip: IpAddr, request: &SyncRequest) -> Result<SyncResponse> {
        let payload = encode_within(request, self.max_payload)?;
        let target = SocketAddr::new(device_ip, self.port);
        let local: SocketAddr = match device_ip {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;
        socket.send(&payload).await?;

        let mut buffer = [0u8; RECEIVE_BUFFER];
        let len = timeout(self.timeout, socket.recv(&mut buffer))
            .await
            .map_err(|_| Error::timeout_from(request_name(request), target.to_string()))??;

        Ok(JsonSerializer::deserialize(&buffer[..len])?)
    }
}

fn request_name(request: &SyncRequest) -> &'static str {
    match request {
        SyncRequest::GetConfig { .. } => "config_response",
        SyncRequest::SetConfig(_) => "config_update_response",
    }
}

#[async_trait]
impl ConfigSyncTransport for UdpSyncTransport {
    async fn get_config(&self, device_ip: IpAddr, device_id: &str) -> Result<ConfigReport> {
        let request = SyncRequest::GetConfig {
            device_id: device_id.to_string(),
        };
        match self.exchange(device_ip, &request).await? {
            SyncResponse::ConfigResponse(report) => Ok(report),
            other => Err(Error::serialization(format!(
                "Unexpected answer to get_config: {:?}",
                other
            ))),
        }
    }

    async fn set_config(&self, device_ip: IpAddr, patch: &ConfigPatch) -> Result<UpdateResult> {
        let request = SyncRequest::SetConfig(patch.clone());
        match self.exchange(device_ip, &request).await? {
            SyncResponse::ConfigUpdateResponse(result) => Ok(result),
            other => Err(Error::serialization(format!(
                "Unexpected answer to set_config: {:?}",
                other
            ))),
        }
    }
}

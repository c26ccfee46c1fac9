use alloc::format;
use core::net::SocketAddrV4;

use patcom_api::ConfigPatch;
use patcom_api::message::{SyncRequest, SyncResponse, UpdateResult};
use patcom_api::transport::{decode, encode};

use crate::device::DeviceContext;
use crate::error::{Error, Result};
use crate::storage::LocalStorage;

use super::{DatagramSocket, InboundPacket};

/// Device side of remote configuration on the config port
pub struct ConfigSyncResponder<N> {
    socket: N,
}

impl<N> ConfigSyncResponder<N>
where
    N: DatagramSocket,
{
    pub fn new(socket: N) -> Self {
        Self { socket }
    }

    pub fn socket(&self) -> &N {
        &self.socket
    }

    pub async fn handle_packet<S>(
        &mut self,
        packet: &InboundPacket,
        ctx: &mut DeviceContext<S>,
    ) -> Result<()>
    where
        S: LocalStorage,
    {
        let request: SyncRequest = match decode(&packet.data) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("Ignoring config packet from {}: {}", packet.source, e);
                return Ok(());
            }
        };

        let response = match request {
            SyncRequest::GetConfig { device_id } => {
                if device_id != ctx.identity().device_id {
                    log::debug!("get_config for {} is not for this device", device_id);
                    return Ok(());
                }
                SyncResponse::ConfigResponse(ctx.config().report())
            }
            SyncRequest::SetConfig(patch) => {
                SyncResponse::ConfigUpdateResponse(Self::set_config(&patch, packet.source, ctx).await)
            }
        };

        self.reply(&response, packet.source).await
    }

    async fn set_config<S>(
        patch: &ConfigPatch,
        source: SocketAddrV4,
        ctx: &mut DeviceContext<S>,
    ) -> UpdateResult
    where
        S: LocalStorage,
    {
        if patch
            .device_id
            .as_deref()
            .is_some_and(|id| id != ctx.identity().device_id)
        {
            log::warn!("Rejecting set_config from {} addressed to another device", source);
            return UpdateResult::failed("Device ID mismatch", ctx.store.current_hash());
        }

        match ctx.store.apply_patch(patch).await {
            Ok(report) => {
                log::info!("Configuration updated from {}", source);
                if report.network_changed {
                    ctx.schedule_restart();
                }
                UpdateResult::ok("Configuration updated", report.config_hash)
            }
            Err(e) => {
                log::warn!("Remote configuration rejected: {}", e);
                UpdateResult::failed(format!("{}", e), ctx.store.current_hash())
            }
        }
    }

    async fn reply(&mut self, response: &SyncResponse, target: SocketAddrV4) -> Result<()> {
        let bytes = encode(response).map_err(|e| {
            log::error!("Config response does not fit: {}", e);
            Error::from(e)
        })?;
        self.socket.send_to(&bytes, target).await.map_err(|e| {
            log::warn!("Failed to answer {}: {:?}", target, e);
            Error::NetworkError
        })
    }
}

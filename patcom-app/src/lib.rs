use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::discovery::DiscoveryClient;
use crate::error::Result;
use crate::registry::DeviceRegistry;
use crate::settings::Settings;
use crate::sync::UdpSyncTransport;

pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod registry;
pub mod serial;
pub mod settings;
pub mod sync;

pub use coordinator::SyncOutcome;
pub use error::Error;
pub use registry::DiscoveredDevice;

/// Registry whose record lifetime follows the settings
pub fn build_registry(settings: &Settings) -> Arc<DeviceRegistry> {
    let ttl = time::Duration::seconds(settings.discovery.ttl_secs as i64);
    Arc::new(DeviceRegistry::new(ttl))
}

/// Discovery socket on the well-known port, so periodic announcements arrive too
pub async fn bind_discovery(
    settings: &Settings,
    registry: Arc<DeviceRegistry>,
) -> Result<DiscoveryClient> {
    let local = SocketAddr::from((Ipv4Addr::UNSPECIFIED, settings.discovery.port));
    let broadcast = SocketAddr::from((settings.discovery.broadcast, settings.discovery.port));
    DiscoveryClient::bind(local, broadcast, registry).await
}

pub fn build_coordinator(
    settings: &Settings,
    registry: Arc<DeviceRegistry>,
) -> Arc<Coordinator<UdpSyncTransport>> {
    let transport = UdpSyncTransport::new(
        settings.sync.port,
        settings.sync.timeout(),
        settings.sync.max_payload,
    );
    Arc::new(Coordinator::new(
        registry,
        Arc::new(transport),
        settings.sync.max_payload,
    ))
}

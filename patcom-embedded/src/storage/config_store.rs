use alloc::string::String;
use alloc::vec::Vec;

use patcom_api::validation::{self, ValidationError};
use patcom_api::{ConfigHash, ConfigPatch, ConfigSnapshot, DeviceIdentity, FIRMWARE_VERSION};

use crate::{Error, Result};

use super::LocalStorage;

/// Storage key of the persisted configuration document
pub const CONFIG_KEY: &str = "patcom.config";

/// What a successful write changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub config_hash: ConfigHash,
    /// Problems that were saved anyway; affected buttons dispatch as `None`
    pub warnings: Vec<ValidationError>,
    pub network_changed: bool,
}

/// Owner of the persisted configuration.
///
/// The document is stored as one JSON value. The in-memory copy is only
/// replaced after the storage write succeeded, so a failed write leaves the
/// device on its last saved configuration.
pub struct ConfigStore<S> {
    storage: S,
    hardware_id: u64,
    current: ConfigSnapshot,
    hash: ConfigHash,
}

impl<S> ConfigStore<S>
where
    S: LocalStorage,
{
    pub async fn open(storage: S, hardware_id: u64) -> Self {
        let mut store = Self {
            storage,
            hardware_id,
            current: ConfigSnapshot::default(),
            hash: ConfigHash::default(),
        };
        store.current = store.load().await;
        store.hash = store.current.hash();
        store
    }

    /// Read the stored document. Missing or unreadable data yields defaults.
    pub async fn load(&self) -> ConfigSnapshot {
        let mut snapshot = match self.storage.get_item(CONFIG_KEY).await {
            Ok(Some(text)) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("Stored configuration unreadable, using defaults: {}", e);
                ConfigSnapshot::default()
            }),
            Ok(None) => {
                log::info!("No stored configuration, using defaults");
                ConfigSnapshot::default()
            }
            Err(e) => {
                log::warn!("Failed to read configuration: {:?}", e);
                ConfigSnapshot::default()
            }
        };
        self.pin_identity(&mut snapshot);
        snapshot
    }

    pub fn validate(snapshot: &ConfigSnapshot) -> Vec<ValidationError> {
        validation::validate(snapshot)
    }

    pub fn hash(snapshot: &ConfigSnapshot) -> ConfigHash {
        snapshot.hash()
    }

    /// Persist `snapshot` and make it current
    pub async fn save(&mut self, mut snapshot: ConfigSnapshot) -> Result<ConfigHash> {
        self.pin_identity(&mut snapshot);

        let text = serde_json::to_string(&snapshot).map_err(|_| Error::SerializationError)?;
        self.storage
            .set_item(CONFIG_KEY, &text)
            .await
            .map_err(|e| {
                log::error!("Failed to persist configuration: {:?}", e);
                Error::StorageError
            })?;

        self.hash = snapshot.hash();
        self.current = snapshot;
        Ok(self.hash)
    }

    /// Apply a remote or serial update as a single replace-or-reject step.
    ///
    /// An update whose report would not fit one document is refused whole.
    pub async fn apply_patch(&mut self, patch: &ConfigPatch) -> Result<SaveReport> {
        let mut next = self.current.clone();
        let outcome = patch.apply_to(&mut next)?;
        validation::check_report_size(&next)?;
        let warnings = Self::validate(&next);
        for warning in &warnings {
            log::warn!("Configuration saved with problem: {}", warning);
        }

        let config_hash = self.save(next).await?;
        Ok(SaveReport {
            config_hash,
            warnings,
            network_changed: outcome.network_changed,
        })
    }

    /// Forget the WiFi network, keeping everything else
    pub async fn reset_network_credentials(&mut self) -> Result<ConfigHash> {
        let mut next = self.current.clone();
        next.network.clear_credentials();
        self.save(next).await
    }

    pub fn current(&self) -> &ConfigSnapshot {
        &self.current
    }

    pub fn current_hash(&self) -> ConfigHash {
        self.hash
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.current.identity
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn pin_identity(&self, snapshot: &mut ConfigSnapshot) {
        let fixed = DeviceIdentity::for_hardware(self.hardware_id);
        snapshot.identity.device_id = fixed.device_id;
        snapshot.identity.firmware_version = String::from(FIRMWARE_VERSION);
    }
}

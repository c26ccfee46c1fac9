use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::hash::ConfigHash;
use crate::models::ConfigReport;
use crate::patch::ConfigPatch;

/// Requests accepted on the configuration port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncRequest {
    GetConfig { device_id: String },
    SetConfig(ConfigPatch),
}

impl SyncRequest {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::GetConfig { device_id } => Some(device_id),
            Self::SetConfig(patch) => patch.device_id.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncResponse {
    ConfigResponse(ConfigReport),
    ConfigUpdateResponse(UpdateResult),
}

/// Outcome of a configuration write, with the hash of what is now stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub success: bool,
    pub message: String,
    pub config_hash: ConfigHash,
}

impl UpdateResult {
    pub fn ok<S: Into<String>>(message: S, config_hash: ConfigHash) -> Self {
        Self {
            success: true,
            message: message.into(),
            config_hash,
        }
    }

    pub fn failed<S: Into<String>>(message: S, config_hash: ConfigHash) -> Self {
        Self {
            success: false,
            message: message.into(),
            config_hash,
        }
    }
}

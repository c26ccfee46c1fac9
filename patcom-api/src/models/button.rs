use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Longest button name accepted, in characters
pub const MAX_BUTTON_NAME_LEN: usize = 31;

/// Maximum number of parameters attached to one button action
pub const MAX_ACTION_PARAMS: usize = 8;

/// Parameter key holding the action target
pub const PARAM_URL: &str = "url";
/// Parameter key holding the HTTP method
pub const PARAM_METHOD: &str = "method";
/// Parameter key holding the request body
pub const PARAM_BODY: &str = "body";
/// Parameter key holding the webhook shared secret
pub const PARAM_SECRET: &str = "secret";
/// Prefix of parameter keys that become request headers
pub const PARAM_HEADER_PREFIX: &str = "header.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Button press only produces an event
    #[default]
    None,
    /// Configurable HTTP request
    Http,
    /// Fixed JSON envelope posted to a webhook
    Webhook,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::None => "none",
            ActionType::Http => "http",
            ActionType::Webhook => "webhook",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, ActionType::None)
    }

    pub fn needs_url(&self) -> bool {
        matches!(self, ActionType::Http | ActionType::Webhook)
    }
}

/// Bounded key/value parameters of a button action.
///
/// Keys are kept sorted so that serialization and hashing are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ActionParams(BTreeMap<String, String>);

impl ActionParams {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert<K, V>(&mut self, key: K, value: V) -> Result<(), ValidationError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        if !self.0.contains_key(&key) && self.0.len() >= MAX_ACTION_PARAMS {
            return Err(ValidationError::TooManyEntries {
                limit: MAX_ACTION_PARAMS,
            });
        }
        self.0.insert(key, value.into());
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert) for call sites that know the bound holds
    pub fn with<K, V>(mut self, key: K, value: V) -> Result<Self, ValidationError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Keys whose values are never reported remotely
    pub fn is_secret_key(key: &str) -> bool {
        key == PARAM_SECRET || key.starts_with(PARAM_HEADER_PREFIX)
    }

    /// Same keys with secret values blanked, as seen by remote readers
    pub fn redacted(&self) -> Self {
        Self(
            self.0
                .iter()
                .map(|(key, value)| {
                    let value = if Self::is_secret_key(key) {
                        String::new()
                    } else {
                        value.clone()
                    };
                    (key.clone(), value)
                })
                .collect(),
        )
    }

    /// Blank secret values take the value stored under the same key
    pub fn keep_secrets_from(&mut self, stored: &ActionParams) {
        for (key, value) in self.0.iter_mut() {
            if value.is_empty() && Self::is_secret_key(key) {
                if let Some(kept) = stored.get(key) {
                    *value = String::from(kept);
                }
            }
        }
    }

    /// Entries whose key starts with `header.`, with the prefix stripped
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter_map(|(k, v)| k.strip_prefix(PARAM_HEADER_PREFIX).map(|name| (name, v)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<BTreeMap<String, String>> for ActionParams {
    type Error = ValidationError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        if map.len() > MAX_ACTION_PARAMS {
            return Err(ValidationError::TooManyEntries {
                limit: MAX_ACTION_PARAMS,
            });
        }
        Ok(Self(map))
    }
}

impl From<ActionParams> for BTreeMap<String, String> {
    fn from(params: ActionParams) -> Self {
        params.0
    }
}

/// One of the eight programmable buttons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSlot {
    /// Fixed slot index, 0..7
    pub id: u8,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Action kind run on press
    #[serde(default)]
    pub action: ActionType,
    /// Action parameters
    #[serde(default, rename = "config")]
    pub params: ActionParams,
    /// Disabled buttons still emit events but never dispatch
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

pub(crate) fn default_enabled() -> bool {
    true
}

impl ButtonSlot {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            name: Self::default_name(id),
            action: ActionType::None,
            params: ActionParams::new(),
            enabled: true,
        }
    }

    pub fn default_name(id: u8) -> String {
        format!("Button {}", id)
    }

    pub fn url(&self) -> Option<&str> {
        self.params.get(PARAM_URL).filter(|url| !url.is_empty())
    }

    /// Whether every field still holds its factory value
    pub fn is_default(&self) -> bool {
        *self == Self::new(self.id)
    }

    /// Clamp the name to [`MAX_BUTTON_NAME_LEN`] characters and restore an empty one
    pub fn normalize(&mut self) {
        if self.name.is_empty() {
            self.name = Self::default_name(self.id);
        }
        if let Some((index, _)) = self.name.char_indices().nth(MAX_BUTTON_NAME_LEN) {
            self.name.truncate(index);
        }
    }
}

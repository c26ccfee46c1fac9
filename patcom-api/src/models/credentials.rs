use alloc::collections::BTreeMap;
use alloc::string::String;

use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

pub const MAX_CREDENTIALS: usize = 16;
pub const MAX_CREDENTIAL_NAME_LEN: usize = 32;
pub const MAX_CREDENTIAL_VALUE_LEN: usize = 128;

/// Named secrets referenced from action parameters as `{{name}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert<N, V>(&mut self, name: N, value: V) -> Result<(), ValidationError>
    where
        N: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        let value = value.into();
        check_entry(&name, &value)?;
        if !self.0.contains_key(&name) && self.0.len() >= MAX_CREDENTIALS {
            return Err(ValidationError::TooManyEntries {
                limit: MAX_CREDENTIALS,
            });
        }
        self.0.insert(name, value);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same names with every value blanked, as seen by remote readers
    pub fn redacted(&self) -> Self {
        Self(
            self.0
                .keys()
                .map(|name| (name.clone(), String::new()))
                .collect(),
        )
    }

    /// Replace the table with `incoming`. Blank incoming values keep the stored value.
    pub fn merge_from(&mut self, incoming: &Credentials) {
        let merged = incoming
            .0
            .iter()
            .map(|(name, value)| {
                let value = if value.is_empty() {
                    self.0.get(name).cloned().unwrap_or_default()
                } else {
                    value.clone()
                };
                (name.clone(), value)
            })
            .collect();
        self.0 = merged;
    }

    /// Substitute `{{name}}` placeholders. Unknown names are left untouched.
    pub fn resolve(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let name = after[..end].trim();
                    match self.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 2]),
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn check_entry(name: &str, value: &str) -> Result<(), ValidationError> {
    if name.is_empty() || name.chars().count() > MAX_CREDENTIAL_NAME_LEN {
        return Err(ValidationError::EntryTooLong {
            limit: MAX_CREDENTIAL_NAME_LEN,
        });
    }
    if value.chars().count() > MAX_CREDENTIAL_VALUE_LEN {
        return Err(ValidationError::EntryTooLong {
            limit: MAX_CREDENTIAL_VALUE_LEN,
        });
    }
    Ok(())
}

impl TryFrom<BTreeMap<String, String>> for Credentials {
    type Error = ValidationError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        if map.len() > MAX_CREDENTIALS {
            return Err(ValidationError::TooManyEntries {
                limit: MAX_CREDENTIALS,
            });
        }
        for (name, value) in &map {
            check_entry(name, value)?;
        }
        Ok(Self(map))
    }
}

impl From<Credentials> for BTreeMap<String, String> {
    fn from(credentials: Credentials) -> Self {
        credentials.0
    }
}

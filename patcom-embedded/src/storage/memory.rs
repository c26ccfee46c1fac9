use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

use super::LocalStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRejected;

/// Volatile storage for tests and boards without flash.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: BTreeMap<String, String>,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail, as a worn or full flash would
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

impl LocalStorage for MemoryStorage {
    type Error = WriteRejected;

    async fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.data.get(key).cloned())
    }

    async fn set_item(&mut self, key: &str, value: &str) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(WriteRejected);
        }
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

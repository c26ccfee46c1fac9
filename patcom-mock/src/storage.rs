use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use patcom_embedded::storage::LocalStorage;

/// Key/value store kept as one JSON object in a file
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> io::Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => serde_json::from_str(&text).map_err(io::Error::other),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }
}

impl LocalStorage for FileStorage {
    type Error = io::Error;

    async fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set_item(&mut self, key: &str, value: &str) -> Result<(), Self::Error> {
        let mut items = self.read_all().await?;
        items.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(&items).map_err(io::Error::other)?;
        // Replace atomically
        let staging = self.path.with_extension("tmp");
        tokio::fs::write(&staging, text).await?;
        tokio::fs::rename(&staging, &self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_items_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flash.json");

        let mut storage = FileStorage::new(&path);
        assert_eq!(storage.get_item("patcom.config").await.unwrap(), None);
        storage.set_item("patcom.config", r#"{"a":1}"#).await.unwrap();
        storage.set_item("other", "x").await.unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(
            reopened.get_item("patcom.config").await.unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert_eq!(reopened.get_item("other").await.unwrap().as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flash.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let storage = FileStorage::new(&path);

        assert!(storage.get_item("patcom.config").await.is_err());
    }
}

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::sync::Mutex;

use super::{ KeyValueStore, StorageError };

/// Key-value entries kept as a flat JSON object on disk.
///
/// Values are written as strings. Other JSON values found in the file are
/// handed back as their JSON text and left for the caller to validate.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_entries(&self) -> Result<BTreeMap<String, Value>, StorageError> {
        match fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        let entries = self.read_entries().await?;
        Ok(
            entries.get(key).map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
        )
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), Value::String(value.to_string()));
        self.write_entries(&entries).await?;
        debug!("Stored '{}' in {}", key, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("identity.json"));
        assert_eq!(store.get("userId").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_creates_parent_dirs_and_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("identity.json");
        let store = FileStore::new(&path);

        store.put("userId", "12").await.unwrap();
        store.put("conversationId", "34").await.unwrap();
        store.put("userId", "56").await.unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("userId").await.unwrap().as_deref(), Some("56"));
        assert_eq!(reopened.get("conversationId").await.unwrap().as_deref(), Some("34"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[tokio::test]
    async fn non_string_values_read_as_json_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, r#"{"userId": 111, "conversationId": null}"#).unwrap();
        let store = FileStore::new(&path);

        assert_eq!(store.get("userId").await.unwrap().as_deref(), Some("111"));
        assert_eq!(store.get("conversationId").await.unwrap().as_deref(), Some("null"));

        store.put("conversationId", "34").await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, Value> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["userId"], Value::from(111));
        assert_eq!(parsed["conversationId"], Value::from("34"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStore::new(&path);
        assert!(matches!(store.get("userId").await, Err(StorageError::Json(_))));
    }
}

use super::{validate_key, ChangeFeed, RoomStore, RoomSubscription, StoreEventKind, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// One pretty-printed JSON file per document under a root directory.
///
/// `rooms/ABCDE/players` is stored at `{root}/rooms/ABCDE/players.json`.
pub struct JsonFileStore {
    root: PathBuf,
    feed: ChangeFeed,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            feed: ChangeFeed::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.clone();
        path.extend(key.split('/'));
        path.set_extension("json");
        Ok(path)
    }

    /// Turn a file path back into its key, if it is a document
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        if relative.extension()? != "json" {
            return None;
        }
        let stem = relative.with_extension("");
        let segments: Option<Vec<&str>> = stem.components().map(|c| c.as_os_str().to_str()).collect();
        let key = segments?.join("/");
        validate_key(&key).ok()?;
        Some(key)
    }
}

#[async_trait]
impl RoomStore for JsonFileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never see half a document
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&value)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        self.feed.publish(key, StoreEventKind::Put);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                self.feed.publish(key, StoreEventKind::Delete);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self, room: &str) -> RoomSubscription {
        self.feed.subscribe(room)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_documents_survive_a_new_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store
            .put("rooms/ABCDE", json!({"code": "ABCDE"}))
            .await
            .unwrap();
        store
            .put("rooms/ABCDE/players", json!({"players": []}))
            .await
            .unwrap();

        let reopened = JsonFileStore::new(dir.path());
        assert_eq!(
            reopened.get("rooms/ABCDE").await.unwrap(),
            Some(json!({"code": "ABCDE"}))
        );
        assert!(dir.path().join("rooms/ABCDE/players.json").exists());
    }

    #[tokio::test]
    async fn test_list_walks_nested_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        for key in ["rooms/B2", "rooms/A1", "rooms/A1/messages"] {
            store.put(key, json!(1)).await.unwrap();
        }
        // Stray files are not documents
        std::fs::write(dir.path().join("rooms/notes.txt"), "hi").unwrap();

        let keys = store.list("rooms/").await.unwrap();
        assert_eq!(keys, vec!["rooms/A1", "rooms/A1/messages", "rooms/B2"]);
    }

    #[tokio::test]
    async fn test_missing_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("not-created-yet"));

        assert!(store.get("rooms/NOPE").await.unwrap().is_none());
        assert!(store.list("rooms/").await.unwrap().is_empty());
        store.delete("rooms/NOPE").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let result = store.put("../escape", json!(1)).await;
        assert!(matches!(result, Err(super::super::StoreError::InvalidKey(_))));
    }
}

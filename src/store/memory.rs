use super::{validate_key, ChangeFeed, RoomStore, RoomSubscription, StoreEventKind, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// In-process store; contents are lost with the process
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Value>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            feed: ChangeFeed::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        validate_key(key)?;
        Ok(self.docs.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> StoreResult<()> {
        validate_key(key)?;
        self.docs.write().await.insert(key.to_string(), value);
        self.feed.publish(key, StoreEventKind::Put);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        validate_key(key)?;
        if self.docs.write().await.remove(key).is_some() {
            self.feed.publish(key, StoreEventKind::Delete);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let docs = self.docs.read().await;
        Ok(docs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn subscribe(&self, room: &str) -> RoomSubscription {
        self.feed.subscribe(room)
    }
}

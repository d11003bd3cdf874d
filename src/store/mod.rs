//! Document store for room persistence
//!
//! Rooms are persisted as three JSON documents keyed by path-like strings:
//! `rooms/{code}`, `rooms/{code}/players` and `rooms/{code}/messages`.
//! The store offers point reads and writes, prefix listing and change
//! subscriptions scoped to one room. Writes of different documents are not
//! transactional; readers must tolerate a room whose documents are from
//! slightly different moments.

mod file;
mod memory;
mod records;
mod writer;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use records::*;
pub use writer::Persister;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("document is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid document key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    Put,
    Delete,
}

/// A change to one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    pub key: String,
    pub kind: StoreEventKind,
}

#[async_trait]
pub trait RoomStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    async fn put(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Deleting a missing document is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// All keys starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Changes to the documents of one room
    fn subscribe(&self, room: &str) -> RoomSubscription;
}

/// Keys are `/`-separated segments of ASCII letters, digits, `-` and `_`
pub fn validate_key(key: &str) -> StoreResult<()> {
    let valid = !key.is_empty()
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// Fan-out of store changes shared by the store implementations
pub(crate) struct ChangeFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn publish(&self, key: &str, kind: StoreEventKind) {
        // No subscribers is fine
        let _ = self.tx.send(StoreEvent {
            key: key.to_string(),
            kind,
        });
    }

    pub fn subscribe(&self, room: &str) -> RoomSubscription {
        RoomSubscription {
            rx: self.tx.subscribe(),
            key: room_key(room),
        }
    }
}

/// Receives the change events for one room's documents
pub struct RoomSubscription {
    rx: broadcast::Receiver<StoreEvent>,
    key: String,
}

impl RoomSubscription {
    fn matches(&self, key: &str) -> bool {
        key == self.key
            || key
                .strip_prefix(self.key.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Next event for this room; `None` once the store is gone
    pub async fn next(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event.key) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(room_key = %self.key, skipped, "Store subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_validation() {
        assert!(validate_key("rooms/ABCDE").is_ok());
        assert!(validate_key("rooms/ABCDE/players").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("rooms//x").is_err());
        assert!(validate_key("rooms/../etc").is_err());
        assert!(validate_key("/rooms").is_err());
    }

    #[tokio::test]
    async fn test_subscription_is_scoped_to_room() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe("ABC");

        feed.publish("rooms/ABCD", StoreEventKind::Put);
        feed.publish("rooms/XYZ/players", StoreEventKind::Put);
        feed.publish("rooms/ABC/players", StoreEventKind::Delete);

        let event = sub.next().await.unwrap();
        assert_eq!(event.key, "rooms/ABC/players");
        assert_eq!(event.kind, StoreEventKind::Delete);
    }
}

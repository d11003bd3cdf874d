use super::{delete_room, save_snapshot, RoomSnapshot, RoomStore};
use crate::types::RoomCode;
use std::sync::Arc;
use tokio::sync::mpsc;

enum WriteOp {
    Save(Box<RoomSnapshot>),
    Delete(RoomCode),
}

/// Write-behind queue in front of a `RoomStore`.
///
/// A single task applies writes in the order they were queued, so documents
/// never go backwards in time. Failures are logged and dropped.
#[derive(Clone)]
pub struct Persister {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl Persister {
    pub fn spawn(store: Arc<dyn RoomStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(op) = rx.recv().await {
                match op {
                    WriteOp::Save(snapshot) => {
                        if let Err(e) = save_snapshot(store.as_ref(), &snapshot).await {
                            tracing::warn!(room = %snapshot.room.code, "Failed to persist room: {}", e);
                        }
                    }
                    WriteOp::Delete(code) => {
                        if let Err(e) = delete_room(store.as_ref(), &code).await {
                            tracing::warn!(room = %code, "Failed to delete persisted room: {}", e);
                        }
                    }
                }
            }
            tracing::debug!("Persister stopped");
        });

        Self { tx }
    }

    pub fn save(&self, snapshot: RoomSnapshot) {
        if self.tx.send(WriteOp::Save(Box::new(snapshot))).is_err() {
            tracing::warn!("Persister is gone, dropping room write");
        }
    }

    pub fn delete(&self, code: &str) {
        if self.tx.send(WriteOp::Delete(code.to_string())).is_err() {
            tracing::warn!(room = %code, "Persister is gone, dropping room delete");
        }
    }
}

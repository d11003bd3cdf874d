//! Room registry and lifecycle
//!
//! Maps room codes to live rooms. The registry lock and a room's session lock
//! are never held at the same time: lookups clone the `Arc<Room>` out and let
//! go of the map before touching the room.

use crate::config::CoordinatorConfig;
use crate::room::Room;
use crate::store::{Persister, RoomStore};
use crate::types::RoomCode;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub(crate) struct RegistryShared {
    rooms: RwLock<HashMap<RoomCode, Arc<Room>>>,
    config: Arc<CoordinatorConfig>,
    persister: Option<Persister>,
}

impl RegistryShared {
    /// Drop `room` from the map, unless the code now points at a newer room
    pub(crate) async fn forget(&self, room: &Arc<Room>) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get(room.code()) {
            Some(current) if Arc::ptr_eq(current, room) => {
                rooms.remove(room.code());
                tracing::info!(room = %room.code(), "Room removed from registry");
                true
            }
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct RoomRegistry {
    shared: Arc<RegistryShared>,
}

impl RoomRegistry {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::build(config, None)
    }

    /// A registry that writes every room change behind to `store`
    pub fn with_store(config: CoordinatorConfig, store: Arc<dyn RoomStore>) -> Self {
        Self::build(config, Some(Persister::spawn(store)))
    }

    fn build(config: CoordinatorConfig, persister: Option<Persister>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                rooms: RwLock::new(HashMap::new()),
                config: Arc::new(config),
                persister,
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    fn new_room(&self, code: &str) -> Arc<Room> {
        Arc::new(Room::new(
            code.to_string(),
            self.shared.config.clone(),
            Arc::downgrade(&self.shared),
            self.shared.persister.clone(),
        ))
    }

    /// The live room for `code`, created on first use.
    ///
    /// Everyone asking for the same code gets the same room until it closes;
    /// a closed room still in the map is replaced by a fresh one.
    pub async fn get_or_create(&self, code: &str) -> Arc<Room> {
        if let Some(room) = self.get(code).await {
            return room;
        }

        let mut rooms = self.shared.rooms.write().await;
        if let Some(room) = rooms.get(code) {
            if !room.is_closed() {
                return room.clone();
            }
        }

        let room = self.new_room(code);
        rooms.insert(code.to_string(), room.clone());
        tracing::info!(room = %code, "Room created");
        room
    }

    /// Create a room under a fresh, unused code
    pub async fn create_room(&self) -> Arc<Room> {
        let mut rooms = self.shared.rooms.write().await;
        let code = loop {
            let candidate = crate::ids::generate_room_code();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };

        let room = self.new_room(&code);
        rooms.insert(code.clone(), room.clone());
        tracing::info!(room = %code, "Room created");
        room
    }

    /// The live room for `code`, if there is one
    pub async fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.shared
            .rooms
            .read()
            .await
            .get(code)
            .filter(|room| !room.is_closed())
            .cloned()
    }

    pub async fn rooms(&self) -> Vec<Arc<Room>> {
        self.shared.rooms.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.shared.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Delete a room and cancel its timers. Removing twice is a no-op.
    pub async fn remove(&self, code: &str) {
        let removed = self.shared.rooms.write().await.remove(code);
        if let Some(room) = removed {
            room.close(None).await;
            tracing::info!(room = %code, "Room removed from registry");
        }
    }

    /// Close and delete rooms nobody is using.
    ///
    /// A room with no live connections goes right away; a room with
    /// connections goes once it has been idle past the configured threshold.
    /// Returns how many rooms were removed.
    pub async fn sweep_idle(&self) -> usize {
        let threshold = self.shared.config.idle_threshold;
        let mut removed = 0;

        for room in self.rooms().await {
            let reason = if room.is_closed() {
                None
            } else {
                match room.sweep_if_idle(threshold).await {
                    Some(reason) => Some(reason),
                    None => continue,
                }
            };
            if self.shared.forget(&room).await {
                tracing::info!(room = %room.code(), ?reason, "Idle sweep removed room");
                removed += 1;
            }
        }

        removed
    }
}

/// Spawn a background task that runs the idle sweep on the configured interval
pub fn spawn_idle_sweeper(registry: RoomRegistry) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let period = registry.config().sweep_interval;
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;

        loop {
            interval.tick().await;
            let removed = registry.sweep_idle().await;
            if removed > 0 {
                let remaining = registry.len().await;
                tracing::info!(removed, remaining, "Idle sweep finished");
            }
        }
    })
}

//! Typed room documents and the keys they live under

use super::{RoomStore, StoreResult};
use crate::session::RoomSession;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const ROOMS_PREFIX: &str = "rooms/";

pub fn room_key(code: &str) -> String {
    format!("{ROOMS_PREFIX}{code}")
}

pub fn roster_key(code: &str) -> String {
    format!("{ROOMS_PREFIX}{code}/players")
}

pub fn messages_key(code: &str) -> String {
    format!("{ROOMS_PREFIX}{code}/messages")
}

/// Everything about a room except who is in it and what was said
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub code: RoomCode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_id: Option<PlayerId>,
    pub phase: GamePhase,
    pub current_team: Team,
    pub starting_team: Team,
    pub word_pack: WordPack,
    pub board: Vec<Card>,
    pub current_clue: Option<Clue>,
    pub remaining_guesses: Option<u32>,
    pub turn_start_time: Option<DateTime<Utc>>,
    pub turn_duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RosterRecord {
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageLogRecord {
    pub messages: Vec<ChatMessage>,
}

/// The three documents of one room at one moment
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub room: RoomRecord,
    pub roster: RosterRecord,
    pub messages: MessageLogRecord,
}

impl RoomSession {
    pub fn snapshot(&self) -> RoomSnapshot {
        let state = &self.state;
        RoomSnapshot {
            room: RoomRecord {
                code: state.room_code.clone(),
                created_at: self.created_at,
                updated_at: Utc::now(),
                owner_id: state.owner_id.clone(),
                phase: state.phase.clone(),
                current_team: state.current_team,
                starting_team: state.starting_team,
                word_pack: state.word_pack,
                board: state.board.clone(),
                current_clue: state.current_clue.clone(),
                remaining_guesses: state.remaining_guesses,
                turn_start_time: state.turn_start_time,
                turn_duration: state.turn_duration,
            },
            roster: RosterRecord {
                players: state.players.clone(),
            },
            messages: MessageLogRecord {
                messages: self.messages.iter().cloned().collect(),
            },
        }
    }
}

async fn get_json<T: DeserializeOwned>(store: &dyn RoomStore, key: &str) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Write a snapshot: room document first, then roster, then messages
pub async fn save_snapshot(store: &dyn RoomStore, snapshot: &RoomSnapshot) -> StoreResult<()> {
    let code = &snapshot.room.code;
    store
        .put(&room_key(code), serde_json::to_value(&snapshot.room)?)
        .await?;
    store
        .put(&roster_key(code), serde_json::to_value(&snapshot.roster)?)
        .await?;
    store
        .put(&messages_key(code), serde_json::to_value(&snapshot.messages)?)
        .await?;
    Ok(())
}

pub async fn load_room(store: &dyn RoomStore, code: &str) -> StoreResult<Option<RoomRecord>> {
    get_json(store, &room_key(code)).await
}

pub async fn load_roster(store: &dyn RoomStore, code: &str) -> StoreResult<Option<RosterRecord>> {
    get_json(store, &roster_key(code)).await
}

pub async fn load_messages(
    store: &dyn RoomStore,
    code: &str,
) -> StoreResult<Option<MessageLogRecord>> {
    get_json(store, &messages_key(code)).await
}

/// Remove a room's documents; the room document goes last
pub async fn delete_room(store: &dyn RoomStore, code: &str) -> StoreResult<()> {
    store.delete(&messages_key(code)).await?;
    store.delete(&roster_key(code)).await?;
    store.delete(&room_key(code)).await?;
    Ok(())
}

/// Codes of every room with at least one stored document
pub async fn list_room_codes(store: &dyn RoomStore) -> StoreResult<Vec<RoomCode>> {
    let codes: BTreeSet<RoomCode> = store
        .list(ROOMS_PREFIX)
        .await?
        .iter()
        .filter_map(|key| key.strip_prefix(ROOMS_PREFIX))
        .filter_map(|rest| rest.split('/').next())
        .map(str::to_string)
        .collect();
    Ok(codes.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Command, JoinRequest};
    use crate::store::MemoryStore;

    fn session_with_chat() -> RoomSession {
        let mut session = RoomSession::new("ROOM1", 50);
        let id = session.join_player(&JoinRequest::named("Alice")).unwrap();
        session
            .execute(
                &id,
                Command::SendChatMessage {
                    text: "hi".to_string(),
                },
            )
            .unwrap();
        session
    }

    #[tokio::test]
    async fn test_snapshot_is_stored_as_three_documents() {
        let store = MemoryStore::new();
        let session = session_with_chat();
        save_snapshot(&store, &session.snapshot()).await.unwrap();

        let keys = store.list(ROOMS_PREFIX).await.unwrap();
        assert_eq!(
            keys,
            vec!["rooms/ROOM1", "rooms/ROOM1/messages", "rooms/ROOM1/players"]
        );

        let room = load_room(&store, "ROOM1").await.unwrap().unwrap();
        assert_eq!(room.code, "ROOM1");
        assert_eq!(room.board, session.state().board);

        let roster = load_roster(&store, "ROOM1").await.unwrap().unwrap();
        assert_eq!(roster.players[0].name, "Alice");

        let log = load_messages(&store, "ROOM1").await.unwrap().unwrap();
        assert!(log.messages.iter().any(|m| m.text == "hi"));
    }

    #[tokio::test]
    async fn test_delete_and_list_codes() {
        let store = MemoryStore::new();
        let session = session_with_chat();
        save_snapshot(&store, &session.snapshot()).await.unwrap();
        store
            .put(&roster_key("ORPHAN"), serde_json::json!({"players": []}))
            .await
            .unwrap();

        assert_eq!(list_room_codes(&store).await.unwrap(), vec!["ORPHAN", "ROOM1"]);

        delete_room(&store, "ROOM1").await.unwrap();
        assert_eq!(list_room_codes(&store).await.unwrap(), vec!["ORPHAN"]);
    }
}

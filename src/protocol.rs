use crate::types::*;
use serde::{Deserialize, Serialize};

/// Messages sent by clients.
///
/// The issuer is implied by the connection: a socket is bound to a player by
/// `Join`, and every later command is applied on that player's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        name: String,
        /// Previously issued id, for reconnecting as the same player
        #[serde(default)]
        player_id: Option<PlayerId>,
        #[serde(default)]
        avatar: Option<String>,
    },
    Leave,
    SetTeamRole {
        team: Team,
        role: Role,
    },
    RandomizeTeams,
    StartGame,
    GiveClue {
        word: String,
        count: u32,
    },
    VoteCard {
        index: usize,
    },
    ConfirmReveal {
        index: usize,
    },
    EndTurn,
    EndGame,
    ResumeGame,
    Rematch,
    SetTurnDuration {
        seconds: u32,
    },
    SetWordPack {
        pack: WordPack,
    },
    SendChatMessage {
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent to a connection once it is bound to a player
    Joined {
        player_id: PlayerId,
        room_code: RoomCode,
    },
    /// Full canonical state plus the trailing message window
    StateUpdate {
        state: GameState,
        messages: Vec<ChatMessage>,
    },
    /// Lightweight presence update
    PlayerCountUpdate {
        connected: usize,
        total: usize,
    },
    /// The room is about to be destroyed
    RoomClosed {
        reason: RoomClosedReason,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<&crate::error::CommandError> for ServerMessage {
    fn from(err: &crate::error::CommandError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque ID types for type safety
pub type RoomCode = String;
pub type PlayerId = String;
pub type MessageId = String;
pub type ConnectionId = String;

/// Number of cards on a board
pub const BOARD_SIZE: usize = 25;
/// Cards held by the team that moves first
pub const STARTING_TEAM_CARDS: usize = 9;
/// Cards held by the team that moves second
pub const OTHER_TEAM_CARDS: usize = 8;
pub const NEUTRAL_CARDS: usize = 7;
pub const ASSASSIN_CARDS: usize = 1;

/// Default turn length in seconds
pub const DEFAULT_TURN_SECONDS: u32 = 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    pub fn other(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Team::Red => "RED",
            Team::Blue => "BLUE",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    ClueGiver,
    Guesser,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CardTeam {
    Red,
    Blue,
    Neutral,
    Assassin,
}

impl From<Team> for CardTeam {
    fn from(team: Team) -> Self {
        match team {
            Team::Red => CardTeam::Red,
            Team::Blue => CardTeam::Blue,
        }
    }
}

impl CardTeam {
    pub fn label(self) -> &'static str {
        match self {
            CardTeam::Red => "RED",
            CardTeam::Blue => "BLUE",
            CardTeam::Neutral => "NEUTRAL",
            CardTeam::Assassin => "ASSASSIN",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WordPack {
    #[default]
    Classic,
    Nature,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub team: Option<Team>,
    pub role: Option<Role>,
    pub connected: bool,
    pub last_seen: DateTime<Utc>,
}

impl Player {
    pub fn has_assignment(&self) -> bool {
        self.team.is_some() && self.role.is_some()
    }

    pub fn holds(&self, team: Team, role: Role) -> bool {
        self.team == Some(team) && self.role == Some(role)
    }
}

/// A board card. `word` and `team` never change once the board exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub word: String,
    pub team: CardTeam,
    pub revealed: bool,
    pub revealed_by: Option<PlayerId>,
    pub votes: BTreeSet<PlayerId>,
}

impl Card {
    pub fn new(word: String, team: CardTeam) -> Self {
        Self {
            word,
            team,
            revealed: false,
            revealed_by: None,
            votes: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Clue {
    pub word: String,
    pub count: u32,
}

/// Why a turn is frozen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    NoClueGiver,
    NoGuessers,
    TeamDisconnected,
}

impl PauseReason {
    pub fn describe(self, team: Team) -> String {
        match self {
            PauseReason::NoClueGiver => format!("{} has no connected clue-giver", team.label()),
            PauseReason::NoGuessers => format!("{} has no connected guessers", team.label()),
            PauseReason::TeamDisconnected => format!("everyone on {} disconnected", team.label()),
        }
    }
}

/// Where a game is in its lifecycle.
///
/// Pause and game-over details live inside their variants so combinations such
/// as "paused while not started" can't be represented.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GamePhase {
    Lobby,
    Active,
    Paused {
        reason: PauseReason,
        blocked_team: Team,
        /// Turn time already used when the pause began
        elapsed_ms: i64,
    },
    GameOver {
        winner: Option<Team>,
    },
}

/// The canonical state of one room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub room_code: RoomCode,
    pub players: Vec<Player>,
    pub board: Vec<Card>,
    pub owner_id: Option<PlayerId>,
    pub current_team: Team,
    pub starting_team: Team,
    pub word_pack: WordPack,
    pub current_clue: Option<Clue>,
    pub remaining_guesses: Option<u32>,
    pub turn_start_time: Option<DateTime<Utc>>,
    pub turn_duration: u32,
    pub phase: GamePhase,
}

impl GameState {
    pub fn game_started(&self) -> bool {
        !matches!(self.phase, GamePhase::Lobby)
    }

    pub fn game_over(&self) -> bool {
        matches!(self.phase, GamePhase::GameOver { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, GamePhase::Paused { .. })
    }

    pub fn winner(&self) -> Option<Team> {
        match self.phase {
            GamePhase::GameOver { winner } => winner,
            _ => None,
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn is_owner(&self, id: &str) -> bool {
        self.owner_id.as_deref() == Some(id)
    }

    /// Connected players on `team` holding `role`
    pub fn connected_with(&self, team: Team, role: Role) -> usize {
        self.players
            .iter()
            .filter(|p| p.connected && p.holds(team, role))
            .count()
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }

    /// Unrevealed cards still held by `team`
    pub fn cards_left(&self, team: Team) -> usize {
        let card_team = CardTeam::from(team);
        self.board
            .iter()
            .filter(|c| c.team == card_team && !c.revealed)
            .count()
    }

    /// Remove every vote, e.g. when the turn changes hands
    pub fn clear_votes(&mut self) {
        for card in &mut self.board {
            card.votes.clear();
        }
    }

    pub fn clear_votes_of(&mut self, player_id: &str) {
        for card in &mut self.board {
            card.votes.remove(player_id);
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Chat,
    Clue,
    System,
}

/// A chat line, clue announcement or system notice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub author_id: Option<PlayerId>,
    pub author_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub kind: MessageKind,
}

/// Why a room is being torn down
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RoomClosedReason {
    Abandoned,
    AllPlayersLeft,
    Timeout,
}

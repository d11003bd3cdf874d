//! Command rejection taxonomy
//!
//! Every command either applies completely or fails with one of these, leaving
//! the room untouched. Errors go back to the issuing connection only.

use crate::clue::ClueRejection;

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    // Stale references: the client should re-join
    #[error("room no longer exists, please re-join")]
    RoomClosed,

    #[error("player is not part of this room, please re-join")]
    UnknownPlayer,

    // Join validation
    #[error("invalid display name: {0}")]
    InvalidName(String),

    #[error("the name {0} is already taken in this room")]
    NameTaken(String),

    #[error("join the room first")]
    NotJoined,

    #[error("already joined a room on this connection")]
    AlreadyJoined,

    #[error("invalid room code")]
    InvalidRoomCode,

    // Authorization
    #[error("only the room owner can {0}")]
    NotOwner(&'static str),

    #[error("it is not your team's turn")]
    NotYourTurn,

    #[error("only a {0} can do that")]
    WrongRole(&'static str),

    #[error("your team already has a connected clue-giver")]
    ClueGiverTaken,

    // Phase
    #[error("the game is paused")]
    GamePaused,

    #[error("the game has not started")]
    GameNotStarted,

    #[error("the game has already started")]
    GameAlreadyStarted,

    #[error("the game is over")]
    GameOver,

    #[error("the game is not over yet")]
    GameNotOver,

    #[error("the game is not paused")]
    NotPaused,

    #[error("teams are not ready: {0}")]
    TeamsNotReady(String),

    // Turn and board
    #[error("invalid clue: {0}")]
    InvalidClue(#[from] ClueRejection),

    #[error("a clue has already been given this turn")]
    ClueAlreadyGiven,

    #[error("waiting for a clue")]
    NoActiveClue,

    #[error("no guesses remaining this turn")]
    NoGuessesRemaining,

    #[error("card {0} does not exist")]
    InvalidCardIndex(usize),

    #[error("card {0} is already revealed")]
    CardAlreadyRevealed(usize),

    #[error("vote for the card before revealing it")]
    NotVoted,

    #[error("not enough votes to reveal: {have} of {need}")]
    InsufficientVotes { have: usize, need: usize },

    // Settings and chat
    #[error("turn duration must be between {min} and {max} seconds")]
    InvalidTurnDuration { min: u32, max: u32 },

    #[error("invalid chat message: {0}")]
    InvalidChatMessage(&'static str),
}

impl CommandError {
    /// Stable machine-readable code sent to clients
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::RoomClosed => "STALE_ROOM",
            CommandError::UnknownPlayer => "STALE_PLAYER",
            CommandError::InvalidName(_) => "INVALID_NAME",
            CommandError::NameTaken(_) => "NAME_TAKEN",
            CommandError::NotJoined => "NOT_JOINED",
            CommandError::AlreadyJoined => "ALREADY_JOINED",
            CommandError::InvalidRoomCode => "INVALID_ROOM_CODE",
            CommandError::NotOwner(_) => "NOT_OWNER",
            CommandError::NotYourTurn => "NOT_YOUR_TURN",
            CommandError::WrongRole(_) => "WRONG_ROLE",
            CommandError::ClueGiverTaken => "CLUE_GIVER_TAKEN",
            CommandError::GamePaused => "GAME_PAUSED",
            CommandError::GameNotStarted => "GAME_NOT_STARTED",
            CommandError::GameAlreadyStarted => "GAME_ALREADY_STARTED",
            CommandError::GameOver => "GAME_OVER",
            CommandError::GameNotOver => "GAME_NOT_OVER",
            CommandError::NotPaused => "NOT_PAUSED",
            CommandError::TeamsNotReady(_) => "TEAMS_NOT_READY",
            CommandError::InvalidClue(_) => "INVALID_CLUE",
            CommandError::ClueAlreadyGiven => "CLUE_ALREADY_GIVEN",
            CommandError::NoActiveClue => "NO_ACTIVE_CLUE",
            CommandError::NoGuessesRemaining => "NO_GUESSES_REMAINING",
            CommandError::InvalidCardIndex(_) => "INVALID_CARD",
            CommandError::CardAlreadyRevealed(_) => "CARD_ALREADY_REVEALED",
            CommandError::NotVoted => "NOT_VOTED",
            CommandError::InsufficientVotes { .. } => "INSUFFICIENT_VOTES",
            CommandError::InvalidTurnDuration { .. } => "INVALID_TURN_DURATION",
            CommandError::InvalidChatMessage(_) => "INVALID_CHAT_MESSAGE",
        }
    }

    /// True when the command raced a cleanup; the client should re-join
    pub fn is_stale(&self) -> bool {
        matches!(self, CommandError::RoomClosed | CommandError::UnknownPlayer)
    }
}

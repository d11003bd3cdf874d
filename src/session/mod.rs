//! Room session state machine
//!
//! `RoomSession` is the single source of truth for one room: canonical game
//! state, live connection handles, the trailing message log and the room's
//! timers. It is a plain value with synchronous methods; `Room` wraps it in a
//! mutex so that commands, disconnects and timer expiries for one room are
//! applied one at a time, in the order they were received.
//!
//! Every command validates first and mutates second: a rejected command leaves
//! the session exactly as it was.
//!
//! The `impl RoomSession` blocks are split by concern:
//! - `lobby.rs`: roster, team/role selection, game start, settings, rematch
//! - `turn.rs`: clues, turn changes, pause/resume, timeouts, game over
//! - `vote.rs`: reveal consensus
//! - `chat.rs`: the bounded message log
//! - `crate::connection` / `crate::broadcast`: attach/detach and fan-out

mod chat;
mod lobby;
mod turn;
mod vote;

pub use lobby::{JoinRequest, MAX_TURN_SECONDS, MIN_TURN_SECONDS};
pub use vote::required_votes;

use crate::connection::ConnectionHandle;
use crate::error::{CommandError, CommandResult};
use crate::timer::{CleanupTimer, TurnClock, TurnTimer};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::time::Instant;

/// A state-changing command issued by a joined player
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetTeamRole { team: Team, role: Role },
    RandomizeTeams,
    StartGame,
    GiveClue { word: String, count: u32 },
    VoteCard { index: usize },
    ConfirmReveal { index: usize },
    EndTurn,
    EndGame,
    ResumeGame,
    Rematch,
    SetTurnDuration { seconds: u32 },
    SetWordPack { pack: WordPack },
    SendChatMessage { text: String },
}

/// Whether an accepted command changed anything worth broadcasting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
}

pub struct RoomSession {
    pub(crate) state: GameState,
    pub(crate) connections: HashMap<PlayerId, ConnectionHandle>,
    pub(crate) messages: VecDeque<ChatMessage>,
    pub(crate) message_history: usize,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) last_activity: Instant,
    pub(crate) turn_timer: TurnTimer,
    pub(crate) clock: TurnClock,
    pub(crate) cleanup: CleanupTimer,
    pub(crate) closed: bool,
}

impl RoomSession {
    pub fn new(room_code: &str, message_history: usize) -> Self {
        Self {
            state: crate::factory::create_initial_game_state(room_code),
            connections: HashMap::new(),
            messages: VecDeque::new(),
            message_history,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            turn_timer: TurnTimer::default(),
            clock: TurnClock::start(),
            cleanup: CleanupTimer::default(),
            closed: false,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Current time on the clock turn deadlines are measured against
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Apply a command on behalf of `issuer`
    pub fn execute(&mut self, issuer: &str, command: Command) -> CommandResult<Applied> {
        self.require_member(issuer)?;

        match command {
            Command::SetTeamRole { team, role } => self.set_team_role(issuer, team, role),
            Command::RandomizeTeams => self.randomize_teams(issuer),
            Command::StartGame => self.start_game(issuer),
            Command::GiveClue { word, count } => self.give_clue(issuer, &word, count),
            Command::VoteCard { index } => self.vote_card(issuer, index),
            Command::ConfirmReveal { index } => self.confirm_reveal(issuer, index),
            Command::EndTurn => self.end_turn(issuer),
            Command::EndGame => self.end_game(issuer),
            Command::ResumeGame => self.resume_game(issuer),
            Command::Rematch => self.rematch(issuer),
            Command::SetTurnDuration { seconds } => self.set_turn_duration(issuer, seconds),
            Command::SetWordPack { pack } => self.set_word_pack(issuer, pack),
            Command::SendChatMessage { text } => self.send_chat(issuer, &text),
        }
    }

    fn require_member(&self, issuer: &str) -> CommandResult<&Player> {
        self.state.player(issuer).ok_or(CommandError::UnknownPlayer)
    }

    fn require_owner(&self, issuer: &str, action: &'static str) -> CommandResult<()> {
        if self.state.is_owner(issuer) {
            Ok(())
        } else {
            Err(CommandError::NotOwner(action))
        }
    }

    /// Only resume gets through while the game is paused
    fn require_not_paused(&self) -> CommandResult<()> {
        if self.state.is_paused() {
            return Err(CommandError::GamePaused);
        }
        Ok(())
    }

    /// Gameplay commands need a running, unpaused game
    fn require_in_play(&self) -> CommandResult<()> {
        match self.state.phase {
            GamePhase::Active => Ok(()),
            GamePhase::Lobby => Err(CommandError::GameNotStarted),
            GamePhase::Paused { .. } => Err(CommandError::GamePaused),
            GamePhase::GameOver { .. } => Err(CommandError::GameOver),
        }
    }

    fn require_current_team_role(
        &self,
        issuer: &str,
        role: Role,
        role_name: &'static str,
    ) -> CommandResult<()> {
        let player = self.require_member(issuer)?;
        if player.team != Some(self.state.current_team) {
            return Err(CommandError::NotYourTurn);
        }
        if player.role != Some(role) {
            return Err(CommandError::WrongRole(role_name));
        }
        Ok(())
    }

    fn player_name(&self, id: &str) -> String {
        self.state
            .player(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "Someone".to_string())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A started game with one clue-giver and `guessers` guessers per team.
    /// Returns the session plus (red_giver, red_guessers, blue_giver, blue_guessers).
    pub fn started_session(
        guessers: usize,
    ) -> (RoomSession, String, Vec<String>, String, Vec<String>) {
        let mut session = RoomSession::new("TEST", 50);
        let join = |session: &mut RoomSession, name: &str, team, role| {
            let id = session
                .join_player(&JoinRequest::named(name))
                .expect("join");
            session.state.player_mut(&id).expect("player").connected = true;
            session
                .execute(&id, Command::SetTeamRole { team, role })
                .expect("team role");
            id
        };

        let red_giver = join(&mut session, "red-giver", Team::Red, Role::ClueGiver);
        let blue_giver = join(&mut session, "blue-giver", Team::Blue, Role::ClueGiver);
        let red: Vec<_> = (0..guessers)
            .map(|i| join(&mut session, &format!("red-{i}"), Team::Red, Role::Guesser))
            .collect();
        let blue: Vec<_> = (0..guessers)
            .map(|i| join(&mut session, &format!("blue-{i}"), Team::Blue, Role::Guesser))
            .collect();

        session
            .execute(&red_giver, Command::StartGame)
            .expect("start");
        (session, red_giver, red, blue_giver, blue)
    }

    /// Ids of (clue-giver, guessers) for the team whose turn it is
    pub fn current_team(
        session: &RoomSession,
        red: (&String, &Vec<String>),
        blue: (&String, &Vec<String>),
    ) -> (String, Vec<String>) {
        match session.state.current_team {
            Team::Red => (red.0.clone(), red.1.clone()),
            Team::Blue => (blue.0.clone(), blue.1.clone()),
        }
    }

    /// Index of the first unrevealed card of `team`
    pub fn card_of(session: &RoomSession, team: CardTeam) -> usize {
        session
            .state
            .board
            .iter()
            .position(|c| c.team == team && !c.revealed)
            .expect("card of team")
    }

    /// A clue that can't collide with any board word
    pub const SAFE_CLUE: &str = "QZXJ";
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_unknown_issuer_is_stale() {
        let mut session = RoomSession::new("TEST", 50);
        let result = session.execute("ghost", Command::StartGame);
        assert_eq!(result, Err(CommandError::UnknownPlayer));
    }

    #[test]
    fn test_rejected_command_leaves_state_untouched() {
        let (mut session, red_giver, _red, blue_giver, _blue) = started_session(1);
        let before = session.state.clone();

        let off_turn_giver = if session.state.current_team == Team::Red {
            blue_giver
        } else {
            red_giver
        };
        let result = session.execute(
            &off_turn_giver,
            Command::GiveClue {
                word: SAFE_CLUE.to_string(),
                count: 1,
            },
        );

        assert_eq!(result, Err(CommandError::NotYourTurn));
        assert_eq!(session.state, before);
    }

    #[test]
    fn test_paused_game_rejects_everything_but_resume() {
        let (mut session, red_giver, red, blue_giver, blue) = started_session(1);
        let (giver, guessers) = current_team(&session, (&red_giver, &red), (&blue_giver, &blue));

        session.state.player_mut(&guessers[0]).unwrap().connected = false;
        assert!(session.recompute_connectivity());
        assert!(session.state.is_paused());

        let result = session.execute(
            &giver,
            Command::GiveClue {
                word: SAFE_CLUE.to_string(),
                count: 1,
            },
        );
        assert_eq!(result, Err(CommandError::GamePaused));

        let result = session.execute(&giver, Command::EndTurn);
        assert_eq!(result, Err(CommandError::GamePaused));

        let result = session.execute(
            &giver,
            Command::SendChatMessage {
                text: "brb".to_string(),
            },
        );
        assert_eq!(result, Err(CommandError::GamePaused));

        // Taking the missing seat is a command too
        let result = session.execute(
            &giver,
            Command::SetTeamRole {
                team: session.state.current_team,
                role: Role::Guesser,
            },
        );
        assert_eq!(result, Err(CommandError::GamePaused));
        assert!(session.state.is_paused());

        let owner = session.state.owner_id.clone().unwrap();
        assert_eq!(session.execute(&owner, Command::ResumeGame), Ok(Applied::Changed));
        assert_eq!(session.state.phase, GamePhase::Active);
    }
}

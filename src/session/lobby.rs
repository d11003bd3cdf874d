use super::{Applied, RoomSession};
use crate::error::{CommandError, CommandResult};
use crate::types::*;
use chrono::Utc;
use rand::seq::SliceRandom;

pub const MIN_TURN_SECONDS: u32 = 10;
pub const MAX_TURN_SECONDS: u32 = 600;
const MAX_NAME_CHARS: usize = 24;
const MAX_AVATAR_CHARS: usize = 32;

/// What a client sends to enter a room
#[derive(Debug, Clone, Default)]
pub struct JoinRequest {
    pub name: String,
    /// Previously issued id, for reconnecting as the same player
    pub player_id: Option<PlayerId>,
    pub avatar: Option<String>,
}

impl JoinRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

fn validate_name(raw: &str) -> CommandResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(CommandError::InvalidName("name is empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(CommandError::InvalidName(format!(
            "name is longer than {MAX_NAME_CHARS} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(CommandError::InvalidName(
            "name contains control characters".to_string(),
        ));
    }
    Ok(name.to_string())
}

fn pick_avatar(requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|a| !a.is_empty() && a.chars().count() <= MAX_AVATAR_CHARS)
        .map(str::to_string)
        .or_else(|| petname::petname(1, ""))
        .unwrap_or_else(|| "owl".to_string())
}

impl RoomSession {
    /// Add a player to the roster, or find the one this request reclaims.
    ///
    /// A known `player_id` always reattaches to that player. Otherwise a name
    /// that matches a disconnected player reclaims that seat, and a name that
    /// matches a connected player is rejected. The first player to join owns
    /// the room.
    pub fn join_player(&mut self, request: &JoinRequest) -> CommandResult<PlayerId> {
        if let Some(id) = request.player_id.as_deref() {
            if self.state.player(id).is_some() {
                return Ok(id.to_string());
            }
        }

        let name = validate_name(&request.name)?;
        let existing = self
            .state
            .players
            .iter()
            .find(|p| p.name.to_lowercase() == name.to_lowercase());
        if let Some(existing) = existing {
            if existing.connected {
                return Err(CommandError::NameTaken(name));
            }
            tracing::debug!(room = %self.state.room_code, player = %existing.id, "Seat reclaimed by name");
            return Ok(existing.id.clone());
        }

        let id = crate::ids::generate_player_id();
        self.state.players.push(Player {
            id: id.clone(),
            name: name.clone(),
            avatar: pick_avatar(request.avatar.as_deref()),
            team: None,
            role: None,
            connected: false,
            last_seen: Utc::now(),
        });
        if self.state.owner_id.is_none() {
            self.state.owner_id = Some(id.clone());
        }

        self.push_system(format!("{name} joined"));
        tracing::info!(room = %self.state.room_code, player = %id, "Player joined");
        Ok(id)
    }

    /// Remove a player on an explicit leave.
    ///
    /// In the lobby the player is dropped from the roster. Once a game has
    /// started the seat stays and the player is only marked disconnected.
    pub fn leave(&mut self, player_id: &str) -> CommandResult<()> {
        let player = self
            .state
            .player_mut(player_id)
            .ok_or(CommandError::UnknownPlayer)?;
        player.connected = false;
        player.last_seen = Utc::now();
        let name = player.name.clone();

        self.connections.remove(player_id);
        self.state.clear_votes_of(player_id);

        let was_owner = self.state.is_owner(player_id);
        if self.state.game_started() {
            self.push_system(format!("{name} left the game"));
        } else {
            self.state.players.retain(|p| p.id != player_id);
            self.push_system(format!("{name} left"));
        }
        if was_owner {
            self.transfer_ownership(player_id);
        }

        tracing::info!(room = %self.state.room_code, player = %player_id, "Player left");
        self.recompute_connectivity();
        Ok(())
    }

    /// Hand the room to the first connected player, else the first player
    /// other than `leaving`
    fn transfer_ownership(&mut self, leaving: &str) {
        let mut others = self.state.players.iter().filter(|p| p.id != leaving);
        let next = others
            .clone()
            .find(|p| p.connected)
            .or_else(|| others.next())
            .map(|p| p.id.clone());

        if let Some(id) = next.as_deref() {
            let name = self.player_name(id);
            self.push_system(format!("{name} now owns the room"));
        }
        self.state.owner_id = next;
    }

    pub(super) fn set_team_role(
        &mut self,
        issuer: &str,
        team: Team,
        role: Role,
    ) -> CommandResult<Applied> {
        self.require_not_paused()?;
        let current = self.require_member(issuer)?;
        if current.holds(team, role) {
            return Ok(Applied::Unchanged);
        }

        if role == Role::ClueGiver {
            let taken = self
                .state
                .players
                .iter()
                .any(|p| p.id != issuer && p.connected && p.holds(team, Role::ClueGiver));
            if taken {
                return Err(CommandError::ClueGiverTaken);
            }
            // A disconnected clue-giver gives up the seat
            for player in &mut self.state.players {
                if player.id != issuer && player.holds(team, Role::ClueGiver) {
                    player.role = Some(Role::Guesser);
                }
            }
        }

        if let Some(player) = self.state.player_mut(issuer) {
            player.team = Some(team);
            player.role = Some(role);
        }
        self.state.clear_votes_of(issuer);

        let name = self.player_name(issuer);
        let role_name = match role {
            Role::ClueGiver => "clue-giver",
            Role::Guesser => "guesser",
        };
        self.push_system(format!("{name} is now {} {role_name}", team.label()));
        self.recompute_connectivity();
        Ok(Applied::Changed)
    }

    pub(super) fn randomize_teams(&mut self, issuer: &str) -> CommandResult<Applied> {
        self.require_owner(issuer, "randomize teams")?;
        if self.state.game_started() {
            return Err(CommandError::GameAlreadyStarted);
        }

        let mut order: Vec<usize> = (0..self.state.players.len()).collect();
        order.shuffle(&mut rand::rng());

        for (position, index) in order.into_iter().enumerate() {
            let team = if position % 2 == 0 { Team::Red } else { Team::Blue };
            // The first player dealt to each team gives clues
            let role = if position < 2 {
                Role::ClueGiver
            } else {
                Role::Guesser
            };
            let player = &mut self.state.players[index];
            player.team = Some(team);
            player.role = Some(role);
        }

        self.push_system("Teams randomized".to_string());
        self.recompute_connectivity();
        Ok(Applied::Changed)
    }

    /// Check that every player has a seat and both teams can play
    fn check_teams_ready(&self) -> CommandResult<()> {
        if let Some(unassigned) = self.state.players.iter().find(|p| !p.has_assignment()) {
            return Err(CommandError::TeamsNotReady(format!(
                "{} has not picked a team and role",
                unassigned.name
            )));
        }

        for team in [Team::Red, Team::Blue] {
            let count = |role| {
                self.state
                    .players
                    .iter()
                    .filter(|p| p.holds(team, role))
                    .count()
            };
            if count(Role::ClueGiver) != 1 {
                return Err(CommandError::TeamsNotReady(format!(
                    "{} needs exactly one clue-giver",
                    team.label()
                )));
            }
            if count(Role::Guesser) == 0 {
                return Err(CommandError::TeamsNotReady(format!(
                    "{} needs at least one guesser",
                    team.label()
                )));
            }
        }
        Ok(())
    }

    pub(super) fn start_game(&mut self, issuer: &str) -> CommandResult<Applied> {
        self.require_owner(issuer, "start the game")?;
        if self.state.game_started() {
            return Err(CommandError::GameAlreadyStarted);
        }
        self.check_teams_ready()?;

        self.state.phase = GamePhase::Active;
        self.state.current_team = self.state.starting_team;
        self.state.current_clue = None;
        self.state.remaining_guesses = None;
        self.state.turn_start_time = Some(self.now());
        self.state.clear_votes();

        self.push_system(format!(
            "Game started. {} goes first",
            self.state.starting_team.label()
        ));
        tracing::info!(room = %self.state.room_code, starting_team = ?self.state.starting_team, "Game started");
        self.recompute_connectivity();
        Ok(Applied::Changed)
    }

    pub(super) fn set_turn_duration(&mut self, issuer: &str, seconds: u32) -> CommandResult<Applied> {
        self.require_owner(issuer, "change the turn timer")?;
        match self.state.phase {
            GamePhase::Paused { .. } => return Err(CommandError::GamePaused),
            GamePhase::GameOver { .. } => return Err(CommandError::GameOver),
            _ => {}
        }
        if !(MIN_TURN_SECONDS..=MAX_TURN_SECONDS).contains(&seconds) {
            return Err(CommandError::InvalidTurnDuration {
                min: MIN_TURN_SECONDS,
                max: MAX_TURN_SECONDS,
            });
        }
        if self.state.turn_duration == seconds {
            return Ok(Applied::Unchanged);
        }

        self.state.turn_duration = seconds;
        self.push_system(format!("Turn timer set to {seconds}s"));
        Ok(Applied::Changed)
    }

    pub(super) fn set_word_pack(&mut self, issuer: &str, pack: WordPack) -> CommandResult<Applied> {
        self.require_owner(issuer, "change the word pack")?;
        if self.state.game_started() {
            return Err(CommandError::GameAlreadyStarted);
        }
        if self.state.word_pack == pack {
            return Ok(Applied::Unchanged);
        }

        let starting_team = crate::factory::random_starting_team();
        self.state.board = crate::factory::create_board(pack, starting_team);
        self.state.word_pack = pack;
        self.state.starting_team = starting_team;
        self.state.current_team = starting_team;

        self.push_system(format!("Word pack changed to {pack:?}"));
        Ok(Applied::Changed)
    }

    /// Deal a new board for the same room, keeping players and seats
    pub(super) fn rematch(&mut self, issuer: &str) -> CommandResult<Applied> {
        self.require_owner(issuer, "start a rematch")?;
        if !self.state.game_over() {
            return Err(CommandError::GameNotOver);
        }

        let fresh = crate::factory::create_game_state(&self.state.room_code, self.state.word_pack);
        let players = std::mem::take(&mut self.state.players);
        let owner_id = self.state.owner_id.take();
        let turn_duration = self.state.turn_duration;
        self.state = GameState {
            players,
            owner_id,
            turn_duration,
            ..fresh
        };

        self.push_system("Rematch! A new board is ready".to_string());
        tracing::info!(room = %self.state.room_code, "Rematch");
        Ok(Applied::Changed)
    }
}

use super::{Applied, RoomSession};
use crate::error::{CommandError, CommandResult};
use crate::types::*;
use chrono::{DateTime, Utc};

impl RoomSession {
    pub(super) fn give_clue(&mut self, issuer: &str, word: &str, count: u32) -> CommandResult<Applied> {
        self.require_in_play()?;
        self.require_current_team_role(issuer, Role::ClueGiver, "clue-giver")?;
        if self.state.current_clue.is_some() {
            return Err(CommandError::ClueAlreadyGiven);
        }
        let word = crate::clue::validate_clue(word, count, &self.state.board)?;

        self.state.remaining_guesses = Some(count + 1);
        self.push_clue(issuer, format!("{word} {count}"));
        self.state.current_clue = Some(Clue { word, count });
        Ok(Applied::Changed)
    }

    pub(super) fn end_turn(&mut self, issuer: &str) -> CommandResult<Applied> {
        self.require_in_play()?;
        let player = self.require_member(issuer)?;
        if player.team != Some(self.state.current_team) && !self.state.is_owner(issuer) {
            return Err(CommandError::NotYourTurn);
        }

        let name = player.name.clone();
        self.push_system(format!("{name} ended the turn"));
        self.switch_turn();
        Ok(Applied::Changed)
    }

    pub(super) fn end_game(&mut self, issuer: &str) -> CommandResult<Applied> {
        self.require_owner(issuer, "end the game")?;
        self.require_in_play()?;

        let name = self.player_name(issuer);
        self.finish_game(None, format!("{name} ended the game"));
        Ok(Applied::Changed)
    }

    /// Owner override: resume even though a team is still missing players
    pub(super) fn resume_game(&mut self, issuer: &str) -> CommandResult<Applied> {
        self.require_owner(issuer, "resume the game")?;
        if !self.state.is_paused() {
            return Err(CommandError::NotPaused);
        }

        self.resume("Game resumed by the owner".to_string());
        Ok(Applied::Changed)
    }

    /// Hand the turn to the other team
    pub(crate) fn switch_turn(&mut self) {
        self.state.current_team = self.state.current_team.other();
        self.state.current_clue = None;
        self.state.remaining_guesses = None;
        self.state.turn_start_time = Some(self.now());
        self.state.clear_votes();

        self.push_system(format!("{}'s turn", self.state.current_team.label()));
        self.recompute_connectivity();
    }

    pub(crate) fn finish_game(&mut self, winner: Option<Team>, note: String) {
        self.state.phase = GamePhase::GameOver { winner };
        self.state.current_clue = None;
        self.state.remaining_guesses = None;
        self.state.turn_start_time = None;
        self.state.clear_votes();

        self.push_system(note);
        tracing::info!(room = %self.state.room_code, winner = ?winner, "Game over");
    }

    /// The role the current team is missing to keep playing, if any
    fn missing_role(&self, team: Team) -> Option<PauseReason> {
        let givers = self.state.connected_with(team, Role::ClueGiver);
        let guessers = self.state.connected_with(team, Role::Guesser);
        match (givers, guessers) {
            (0, 0) => Some(PauseReason::TeamDisconnected),
            (0, _) => Some(PauseReason::NoClueGiver),
            (_, 0) => Some(PauseReason::NoGuessers),
            _ => None,
        }
    }

    /// Pause or resume based on who is connected.
    ///
    /// Runs after anything that changes connectivity or seats. Only the team
    /// whose turn it is matters. Returns true if the phase changed.
    pub fn recompute_connectivity(&mut self) -> bool {
        match self.state.phase.clone() {
            GamePhase::Active => match self.missing_role(self.state.current_team) {
                Some(reason) => {
                    self.pause(reason);
                    true
                }
                None => false,
            },
            GamePhase::Paused {
                reason,
                blocked_team,
                elapsed_ms,
            } => match self.missing_role(blocked_team) {
                None => {
                    self.resume(format!("{} is back. Game resumed", blocked_team.label()));
                    true
                }
                Some(now_missing) if now_missing != reason => {
                    self.state.phase = GamePhase::Paused {
                        reason: now_missing,
                        blocked_team,
                        elapsed_ms,
                    };
                    true
                }
                Some(_) => false,
            },
            _ => false,
        }
    }

    fn pause(&mut self, reason: PauseReason) {
        let team = self.state.current_team;
        let elapsed_ms = self
            .state
            .turn_start_time
            .map(|start| (self.now() - start).num_milliseconds().max(0))
            .unwrap_or(0);

        self.state.phase = GamePhase::Paused {
            reason,
            blocked_team: team,
            elapsed_ms,
        };
        self.push_system(format!("Game paused: {}", reason.describe(team)));
        tracing::info!(room = %self.state.room_code, ?reason, "Game paused");
    }

    /// Continue a paused turn with the time it had left
    fn resume(&mut self, note: String) {
        let GamePhase::Paused { elapsed_ms, .. } = self.state.phase else {
            return;
        };
        self.state.phase = GamePhase::Active;
        self.state.turn_start_time = Some(self.now() - chrono::Duration::milliseconds(elapsed_ms));

        self.push_system(note);
        tracing::info!(room = %self.state.room_code, "Game resumed");
    }

    /// The turn that started at `turn_start` ran out of time.
    ///
    /// Ignored unless that exact turn is still running, so a stale timer (or a
    /// second firing) never ends a turn it doesn't belong to.
    pub fn on_turn_timeout(&mut self, turn_start: DateTime<Utc>) -> bool {
        if self.state.phase != GamePhase::Active || self.state.turn_start_time != Some(turn_start) {
            return false;
        }
        if !self.turn_timer.mark_fired(turn_start) {
            return false;
        }

        self.push_system(format!("Time's up for {}", self.state.current_team.label()));
        self.switch_turn();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Command;
    use super::*;

    fn clue(word: &str, count: u32) -> Command {
        Command::GiveClue {
            word: word.to_string(),
            count,
        }
    }

    #[test]
    fn test_clue_sets_guess_budget() {
        let (mut session, rg, red, bg, blue) = started_session(2);
        let (giver, _) = current_team(&session, (&rg, &red), (&bg, &blue));

        session.execute(&giver, clue("qzxj", 2)).unwrap();

        let current = session.state.current_clue.as_ref().unwrap();
        assert_eq!(current.word, "QZXJ");
        assert_eq!(current.count, 2);
        assert_eq!(session.state.remaining_guesses, Some(3));
        assert!(session
            .messages
            .iter()
            .any(|m| m.kind == MessageKind::Clue && m.text == "QZXJ 2"));
    }

    #[test]
    fn test_clue_rules() {
        let (mut session, rg, red, bg, blue) = started_session(2);
        let (giver, guessers) = current_team(&session, (&rg, &red), (&bg, &blue));

        let result = session.execute(&guessers[0], clue(SAFE_CLUE, 1));
        assert_eq!(result, Err(CommandError::WrongRole("clue-giver")));

        let board_word = session.state.board[0].word.clone();
        let result = session.execute(&giver, clue(&board_word, 1));
        assert!(matches!(result, Err(CommandError::InvalidClue(_))));
        assert!(session.state.current_clue.is_none());

        session.execute(&giver, clue(SAFE_CLUE, 1)).unwrap();
        let result = session.execute(&giver, clue("OTHER", 1));
        assert_eq!(result, Err(CommandError::ClueAlreadyGiven));
    }

    #[test]
    fn test_end_turn_by_other_team_rejected_owner_allowed() {
        let (mut session, rg, red, bg, blue) = started_session(1);
        let starting = session.state.current_team;
        let (_, off_guessers) = match starting {
            Team::Red => (bg.clone(), blue.clone()),
            Team::Blue => (rg.clone(), red.clone()),
        };

        let result = session.execute(&off_guessers[0], Command::EndTurn);
        assert_eq!(result, Err(CommandError::NotYourTurn));

        // red-giver owns the room and may always end the turn
        session.execute(&rg, Command::EndTurn).unwrap();
        assert_eq!(session.state.current_team, starting.other());
        assert!(session.state.current_clue.is_none());
        assert!(session.state.remaining_guesses.is_none());
    }

    #[test]
    fn test_switch_turn_clears_votes() {
        let (mut session, rg, red, bg, blue) = started_session(2);
        let (giver, guessers) = current_team(&session, (&rg, &red), (&bg, &blue));
        session.execute(&giver, clue(SAFE_CLUE, 1)).unwrap();
        session
            .execute(&guessers[0], Command::VoteCard { index: 3 })
            .unwrap();

        session.execute(&giver, Command::EndTurn).unwrap();
        assert!(session.state.board.iter().all(|c| c.votes.is_empty()));
    }

    #[test]
    fn test_disconnect_pauses_and_reconnect_resumes_with_elapsed_time() {
        let (mut session, rg, red, bg, blue) = started_session(1);
        let (giver, _) = current_team(&session, (&rg, &red), (&bg, &blue));
        let team = session.state.current_team;

        let started = session.now() - chrono::Duration::seconds(20);
        session.state.turn_start_time = Some(started);

        session.state.player_mut(&giver).unwrap().connected = false;
        assert!(session.recompute_connectivity());
        match session.state.phase {
            GamePhase::Paused {
                reason,
                blocked_team,
                elapsed_ms,
            } => {
                assert_eq!(reason, PauseReason::NoClueGiver);
                assert_eq!(blocked_team, team);
                assert!(elapsed_ms >= 20_000);
            }
            ref other => panic!("Expected paused, got {:?}", other),
        }

        session.state.player_mut(&giver).unwrap().connected = true;
        assert!(session.recompute_connectivity());
        assert_eq!(session.state.phase, GamePhase::Active);

        // The resumed turn still has the 20 seconds it had used
        let used = session.now() - session.state.turn_start_time.unwrap();
        assert!(used.num_seconds() >= 20 && used.num_seconds() < 25);
    }

    #[test]
    fn test_other_team_disconnect_does_not_pause() {
        let (mut session, rg, _red, bg, _blue) = started_session(1);
        let off_giver = match session.state.current_team {
            Team::Red => &bg,
            Team::Blue => &rg,
        };

        session.state.player_mut(off_giver).unwrap().connected = false;
        assert!(!session.recompute_connectivity());
        assert_eq!(session.state.phase, GamePhase::Active);
    }

    #[test]
    fn test_whole_team_gone_is_team_disconnected() {
        let (mut session, rg, red, bg, blue) = started_session(1);
        let (giver, guessers) = current_team(&session, (&rg, &red), (&bg, &blue));
        session.state.player_mut(&giver).unwrap().connected = false;
        session.state.player_mut(&guessers[0]).unwrap().connected = false;

        session.recompute_connectivity();
        assert!(matches!(
            session.state.phase,
            GamePhase::Paused {
                reason: PauseReason::TeamDisconnected,
                ..
            }
        ));
    }

    #[test]
    fn test_owner_resume_override() {
        let (mut session, rg, red, bg, blue) = started_session(1);
        let (_, guessers) = current_team(&session, (&rg, &red), (&bg, &blue));

        let result = session.execute(&rg, Command::ResumeGame);
        assert_eq!(result, Err(CommandError::NotPaused));

        session.state.player_mut(&guessers[0]).unwrap().connected = false;
        session.recompute_connectivity();
        session.execute(&rg, Command::ResumeGame).unwrap();
        assert_eq!(session.state.phase, GamePhase::Active);
    }

    #[test]
    fn test_turn_timeout_fires_once_for_its_own_turn() {
        let (mut session, _, _, _, _) = started_session(1);
        let first = session.state.current_team;
        let turn = session.state.turn_start_time.unwrap();

        assert!(!session.on_turn_timeout(turn - chrono::Duration::seconds(1)));
        assert!(session.on_turn_timeout(turn));
        assert_eq!(session.state.current_team, first.other());

        assert!(!session.on_turn_timeout(turn));
        assert_eq!(session.state.current_team, first.other());
    }

    #[test]
    fn test_turn_timeout_ignored_while_paused() {
        let (mut session, rg, red, bg, blue) = started_session(1);
        let (giver, _) = current_team(&session, (&rg, &red), (&bg, &blue));
        let turn = session.state.turn_start_time.unwrap();

        session.state.player_mut(&giver).unwrap().connected = false;
        session.recompute_connectivity();
        assert!(!session.on_turn_timeout(turn));
        assert!(session.state.is_paused());
    }

    #[test]
    fn test_end_game_needs_owner() {
        let (mut session, rg, red, _, _) = started_session(1);
        let result = session.execute(&red[0], Command::EndGame);
        assert_eq!(result, Err(CommandError::NotOwner("end the game")));

        session.execute(&rg, Command::EndGame).unwrap();
        assert!(session.state.game_over());
        assert_eq!(session.state.winner(), None);

        let result = session.execute(&rg, Command::EndGame);
        assert_eq!(result, Err(CommandError::GameOver));
    }
}

//! Reveal consensus
//!
//! Guessers vote on cards; a card is revealed only when one of its voters
//! confirms and the card holds a majority of the team's connected guessers.

use super::{Applied, RoomSession};
use crate::error::{CommandError, CommandResult};
use crate::types::*;

/// Votes needed to reveal with `guessers` connected guessers: `max(1, ceil((n + 1) / 2))`
pub fn required_votes(guessers: usize) -> usize {
    ((guessers + 2) / 2).max(1)
}

impl RoomSession {
    /// Checks shared by voting and confirming; returns nothing, mutates nothing
    fn check_guess(&self, issuer: &str, index: usize) -> CommandResult<()> {
        self.require_in_play()?;
        self.require_current_team_role(issuer, Role::Guesser, "guesser")?;
        if self.state.current_clue.is_none() {
            return Err(CommandError::NoActiveClue);
        }
        if self.state.remaining_guesses.unwrap_or(0) == 0 {
            return Err(CommandError::NoGuessesRemaining);
        }
        let card = self
            .state
            .board
            .get(index)
            .ok_or(CommandError::InvalidCardIndex(index))?;
        if card.revealed {
            return Err(CommandError::CardAlreadyRevealed(index));
        }
        Ok(())
    }

    pub(super) fn vote_card(&mut self, issuer: &str, index: usize) -> CommandResult<Applied> {
        self.check_guess(issuer, index)?;

        if self.state.board[index].votes.insert(issuer.to_string()) {
            Ok(Applied::Changed)
        } else {
            Ok(Applied::Unchanged)
        }
    }

    pub(super) fn confirm_reveal(&mut self, issuer: &str, index: usize) -> CommandResult<Applied> {
        self.check_guess(issuer, index)?;

        if !self.state.board[index].votes.contains(issuer) {
            return Err(CommandError::NotVoted);
        }
        let team = self.state.current_team;
        let have = self.eligible_votes(index);
        let need = required_votes(self.state.connected_with(team, Role::Guesser));
        if have < need {
            return Err(CommandError::InsufficientVotes { have, need });
        }

        self.reveal_card(index, issuer);
        Ok(Applied::Changed)
    }

    /// Votes on a card from players who are still connected guessers of the
    /// team whose turn it is
    fn eligible_votes(&self, index: usize) -> usize {
        let team = self.state.current_team;
        self.state.board[index]
            .votes
            .iter()
            .filter(|id| {
                self.state
                    .player(id)
                    .is_some_and(|p| p.connected && p.holds(team, Role::Guesser))
            })
            .count()
    }

    /// Flip a card and settle the consequences: game over, keep guessing, or
    /// turn change
    fn reveal_card(&mut self, index: usize, revealer: &str) {
        let team = self.state.current_team;
        let card = &mut self.state.board[index];
        card.revealed = true;
        card.revealed_by = Some(revealer.to_string());
        card.votes.clear();
        let word = card.word.clone();
        let card_team = card.team;

        self.state.remaining_guesses = self.state.remaining_guesses.map(|r| r.saturating_sub(1));

        let name = self.player_name(revealer);
        self.push_system(format!("{name} revealed {word} ({})", card_team.label()));
        tracing::debug!(room = %self.state.room_code, index, card = ?card_team, "Card revealed");

        if card_team == CardTeam::Assassin {
            let winner = team.other();
            self.finish_game(
                Some(winner),
                format!("{word} was the assassin! {} wins", winner.label()),
            );
            return;
        }

        for candidate in [team, team.other()] {
            if self.state.cards_left(candidate) == 0 {
                self.finish_game(
                    Some(candidate),
                    format!("{} found all their agents and wins", candidate.label()),
                );
                return;
            }
        }

        if card_team != CardTeam::from(team) {
            self.switch_turn();
        } else if self.state.remaining_guesses == Some(0) {
            self.push_system("Out of guesses".to_string());
            self.switch_turn();
        }
    }
}

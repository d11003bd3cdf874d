//! Builds fresh boards and game states.

use crate::types::*;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

/// Pick the team that moves first; both teams are equally likely
pub fn random_starting_team() -> Team {
    if rand::rng().random_bool(0.5) {
        Team::Red
    } else {
        Team::Blue
    }
}

/// Draw a shuffled 25-card board from `pack`.
///
/// `starting_team` receives 9 cards, the other team 8, then 7 neutral cards
/// and a single assassin.
pub fn create_board(pack: WordPack, starting_team: Team) -> Vec<Card> {
    let mut rng = rand::rng();

    let mut teams = Vec::with_capacity(BOARD_SIZE);
    teams.extend(std::iter::repeat_n(
        CardTeam::from(starting_team),
        STARTING_TEAM_CARDS,
    ));
    teams.extend(std::iter::repeat_n(
        CardTeam::from(starting_team.other()),
        OTHER_TEAM_CARDS,
    ));
    teams.extend(std::iter::repeat_n(CardTeam::Neutral, NEUTRAL_CARDS));
    teams.extend(std::iter::repeat_n(CardTeam::Assassin, ASSASSIN_CARDS));
    teams.shuffle(&mut rng);

    pack.words()
        .choose_multiple(&mut rng, BOARD_SIZE)
        .zip(teams)
        .map(|(word, team)| Card::new(word.to_string(), team))
        .collect()
}

/// Canonical state for a brand-new room
pub fn create_initial_game_state(room_code: &str) -> GameState {
    create_game_state(room_code, WordPack::default())
}

pub fn create_game_state(room_code: &str, pack: WordPack) -> GameState {
    let starting_team = random_starting_team();
    GameState {
        room_code: room_code.to_string(),
        players: Vec::new(),
        board: create_board(pack, starting_team),
        owner_id: None,
        current_team: starting_team,
        starting_team,
        word_pack: pack,
        current_clue: None,
        remaining_guesses: None,
        turn_start_time: None,
        turn_duration: DEFAULT_TURN_SECONDS,
        phase: GamePhase::Lobby,
    }
}

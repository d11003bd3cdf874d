//! Clue validation
//!
//! A clue must be one token and must not give away a board word, either
//! directly, by containment, or as a simple plural/singular variant.

use crate::types::Card;

pub const MAX_CLUE_COUNT: u32 = 9;
const MAX_CLUE_CHARS: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClueRejection {
    #[error("clue cannot be empty")]
    Empty,

    #[error("clue must be a single word")]
    MultipleWords,

    #[error("clue is too long")]
    TooLong,

    #[error("clue may only contain letters, digits, apostrophes and hyphens")]
    InvalidCharacters,

    #[error("clue count must be between 0 and 9")]
    CountOutOfRange,

    #[error("clue is a word on the board: {0}")]
    BoardWord(String),

    #[error("clue is a plural or singular form of {0}")]
    PluralOfBoardWord(String),

    #[error("clue contains the board word {0}")]
    ContainsBoardWord(String),

    #[error("clue is part of the board word {0}")]
    ContainedInBoardWord(String),
}

/// Basic English plural/singular forms of `word`: +S, +ES, -S, -ES
fn plural_variants(word: &str) -> Vec<String> {
    let mut variants = vec![format!("{word}S"), format!("{word}ES")];
    if let Some(stem) = word.strip_suffix("ES") {
        variants.push(stem.to_string());
    }
    if let Some(stem) = word.strip_suffix('S') {
        variants.push(stem.to_string());
    }
    variants.retain(|v| !v.is_empty());
    variants
}

/// Validate a proposed clue against the board.
///
/// Returns the normalized (upper-case, trimmed) clue word on success.
pub fn validate_clue(raw: &str, count: u32, board: &[Card]) -> Result<String, ClueRejection> {
    let word = raw.trim().to_uppercase();

    if word.is_empty() {
        return Err(ClueRejection::Empty);
    }
    if word.split_whitespace().count() > 1 {
        return Err(ClueRejection::MultipleWords);
    }
    if word.chars().count() > MAX_CLUE_CHARS {
        return Err(ClueRejection::TooLong);
    }
    if !word
        .chars()
        .all(|c| c.is_alphanumeric() || c == '\'' || c == '-')
    {
        return Err(ClueRejection::InvalidCharacters);
    }
    if count > MAX_CLUE_COUNT {
        return Err(ClueRejection::CountOutOfRange);
    }

    for card in board {
        let board_word = card.word.to_uppercase();

        if word == board_word {
            return Err(ClueRejection::BoardWord(card.word.clone()));
        }
        if plural_variants(&board_word).contains(&word)
            || plural_variants(&word).contains(&board_word)
        {
            return Err(ClueRejection::PluralOfBoardWord(card.word.clone()));
        }
        if word.contains(&board_word) {
            return Err(ClueRejection::ContainsBoardWord(card.word.clone()));
        }
        if board_word.contains(&word) {
            return Err(ClueRejection::ContainedInBoardWord(card.word.clone()));
        }
    }

    Ok(word)
}

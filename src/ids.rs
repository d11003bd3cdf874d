//! Identifier generation
//!
//! Room codes are short and meant to be read aloud, so they skip glyphs that
//! are easy to confuse (0/O, 1/I/L). Player ids are longer and lowercase; they
//! are opaque to players but end up in URLs and local storage on clients.

use crate::types::{PlayerId, RoomCode};
use rand::Rng;

/// Safe character set for room codes (excludes 0/O, 1/I/L)
pub const ROOM_CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LENGTH: usize = 5;

/// Lowercase counterpart of the room code alphabet
pub const PLAYER_ID_CHARS: &[u8] = b"abcdefghjkmnpqrstuvwxyz23456789";
pub const PLAYER_ID_LENGTH: usize = 12;

/// Client-supplied room codes are accepted in this length range
const MIN_ROOM_CODE_LEN: usize = 3;
const MAX_ROOM_CODE_LEN: usize = 16;

fn random_token(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

/// Generate a random room code (5 characters, ~28M combinations)
pub fn generate_room_code() -> RoomCode {
    random_token(ROOM_CODE_CHARS, ROOM_CODE_LENGTH)
}

/// Generate a random player id (12 characters)
pub fn generate_player_id() -> PlayerId {
    random_token(PLAYER_ID_CHARS, PLAYER_ID_LENGTH)
}

/// Ids for log messages and connections don't need to be short
pub fn generate_ulid() -> String {
    ulid::Ulid::new().to_string()
}

/// Normalize a room code typed by a user.
///
/// Codes are case-insensitive and stored upper-cased. Anything that isn't
/// ASCII alphanumeric (or is too short/long) is rejected so codes stay safe to
/// use as store keys.
pub fn normalize_room_code(raw: &str) -> Option<RoomCode> {
    let code = raw.trim().to_ascii_uppercase();
    let len_ok = (MIN_ROOM_CODE_LEN..=MAX_ROOM_CODE_LEN).contains(&code.len());
    if len_ok && code.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(code)
    } else {
        None
    }
}

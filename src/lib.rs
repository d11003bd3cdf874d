// Public API for the server binary, the maintenance tool and integration tests

pub mod api;
pub mod clue;
pub mod config;
pub mod connection;
pub mod error;
pub mod factory;
pub mod ids;
pub mod maintenance;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod session;
pub mod store;
pub mod timer;
pub mod types;
pub mod words;
pub mod ws;

// Fan-out lives on RoomSession
mod broadcast;

//! Fan-out of server messages to a room's live connections
//!
//! Every state change is followed by a broadcast of the full canonical state.
//! Each broadcast also counts as room activity for the idle sweep.

use crate::protocol::ServerMessage;
use crate::session::RoomSession;
use crate::types::RoomClosedReason;
use tokio::time::Instant;

impl RoomSession {
    /// Full state plus the trailing message window
    pub fn state_message(&self) -> ServerMessage {
        ServerMessage::StateUpdate {
            state: self.state.clone(),
            messages: self.messages.iter().cloned().collect(),
        }
    }

    /// Send the current state to every live connection except `exclude`.
    /// Returns how many connections it was delivered to.
    pub fn broadcast(&mut self, exclude: Option<&str>) -> usize {
        let msg = self.state_message();
        self.fan_out(&msg, exclude)
    }

    pub fn broadcast_player_count(&mut self) -> usize {
        let msg = ServerMessage::PlayerCountUpdate {
            connected: self.state.connected_count(),
            total: self.state.players.len(),
        };
        self.fan_out(&msg, None)
    }

    pub fn broadcast_room_closed(&mut self, reason: RoomClosedReason) -> usize {
        self.fan_out(&ServerMessage::RoomClosed { reason }, None)
    }

    fn fan_out(&mut self, msg: &ServerMessage, exclude: Option<&str>) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for (player_id, handle) in &self.connections {
            if exclude == Some(player_id.as_str()) || !handle.is_live() {
                continue;
            }
            match handle.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(room = %self.state.room_code, player = %player_id, "Dropping dead connection");
                    dead.push(player_id.clone());
                }
            }
        }
        for player_id in dead {
            self.connections.remove(&player_id);
        }

        self.touch();
        delivered
    }

    /// Mark the room as active now
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

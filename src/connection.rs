//! Live client connections
//!
//! A `ConnectionHandle` is the sending half of a connection's outbound queue.
//! Its liveness is independent of the `connected` flag on the player record:
//! the transport task owns the receiving half, and once that task exits the
//! handle reports closed.

use crate::error::{CommandError, CommandResult};
use crate::protocol::ServerMessage;
use crate::session::RoomSession;
use crate::types::ConnectionId;
use chrono::Utc;
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver the transport drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: crate::ids::generate_ulid(),
            tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a message. Fails only if the connection has gone away.
    pub fn send(&self, msg: ServerMessage) -> Result<(), ServerMessage> {
        self.tx.send(msg).map_err(|e| e.0)
    }
}

impl RoomSession {
    /// Bind a connection to a player and mark them connected.
    ///
    /// A newer connection for the same player replaces the old one; the old
    /// transport's later detach is then ignored. Any pending abandonment
    /// cleanup is cancelled.
    pub fn attach(&mut self, player_id: &str, handle: ConnectionHandle) -> CommandResult<()> {
        let player = self
            .state
            .player_mut(player_id)
            .ok_or(CommandError::UnknownPlayer)?;
        player.connected = true;
        player.last_seen = Utc::now();

        if let Some(old) = self.connections.insert(player_id.to_string(), handle) {
            tracing::debug!(player = %player_id, old = %old.id(), "Connection superseded");
        }
        self.cleanup.cancel();
        Ok(())
    }

    /// Unbind a player's connection after its transport ended.
    ///
    /// Only the connection currently bound to the player can detach it.
    /// Returns true if the player went from connected to disconnected.
    pub fn detach(&mut self, player_id: &str, connection_id: &str) -> bool {
        match self.connections.get(player_id) {
            Some(bound) if bound.id() != connection_id => return false,
            Some(_) => {
                self.connections.remove(player_id);
            }
            None => {}
        }

        match self.state.player_mut(player_id) {
            Some(player) if player.connected => {
                player.connected = false;
                player.last_seen = Utc::now();
                self.state.clear_votes_of(player_id);
                true
            }
            _ => false,
        }
    }

    /// Whether `connection_id` is the connection currently bound to the player
    pub fn is_bound(&self, player_id: &str, connection_id: &str) -> bool {
        self.connections
            .get(player_id)
            .is_some_and(|bound| bound.id() == connection_id)
    }

    /// Connections whose transport is still open
    pub fn live_connection_count(&self) -> usize {
        self.connections.values().filter(|h| h.is_live()).count()
    }
}

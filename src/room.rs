//! One live room: a session behind a FIFO mutex
//!
//! Commands, connection changes and timer expiries all go through
//! `session.lock()`, so for one room they are applied one at a time in the
//! order they arrive. Rooms don't coordinate with each other.
//!
//! After every accepted change the room re-arms (or cancels) its turn timer,
//! broadcasts the new state and queues a persistence write, all while still
//! holding the lock, so broadcasts go out in the same order as the changes.

use crate::config::CoordinatorConfig;
use crate::connection::ConnectionHandle;
use crate::error::{CommandError, CommandResult};
use crate::protocol::ServerMessage;
use crate::registry::RegistryShared;
use crate::session::{Applied, Command, JoinRequest, RoomSession};
use crate::store::Persister;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Lightweight view of a room for listings
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub code: RoomCode,
    pub phase: GamePhase,
    pub players: usize,
    pub connected: usize,
    pub live_connections: usize,
}

pub struct Room {
    code: RoomCode,
    config: Arc<CoordinatorConfig>,
    session: Mutex<RoomSession>,
    closed: AtomicBool,
    registry: Weak<RegistryShared>,
    persister: Option<Persister>,
}

impl Room {
    pub(crate) fn new(
        code: RoomCode,
        config: Arc<CoordinatorConfig>,
        registry: Weak<RegistryShared>,
        persister: Option<Persister>,
    ) -> Self {
        let session = RoomSession::new(&code, config.message_history);
        Self {
            code,
            config,
            session: Mutex::new(session),
            closed: AtomicBool::new(false),
            registry,
            persister,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Copy of the canonical state
    pub async fn state(&self) -> GameState {
        self.session.lock().await.state().clone()
    }

    pub async fn summary(&self) -> RoomSummary {
        let session = self.session.lock().await;
        RoomSummary {
            code: self.code.clone(),
            phase: session.state().phase.clone(),
            players: session.state().players.len(),
            connected: session.state().connected_count(),
            live_connections: session.live_connection_count(),
        }
    }

    pub async fn live_connection_count(&self) -> usize {
        self.session.lock().await.live_connection_count()
    }

    /// True if an abandonment cleanup is pending
    pub async fn cleanup_pending(&self) -> bool {
        self.session.lock().await.cleanup.is_armed()
    }

    /// True if a turn timer task is waiting to fire
    pub async fn turn_timer_pending(&self) -> bool {
        self.session.lock().await.turn_timer.is_pending()
    }

    /// Join (or rejoin) a player and bind `connection` to them.
    ///
    /// The joiner gets `Joined` and the full state; everyone else gets the
    /// state and a player count update.
    pub async fn join(
        self: &Arc<Self>,
        request: JoinRequest,
        connection: ConnectionHandle,
    ) -> CommandResult<PlayerId> {
        let mut session = self.session.lock().await;
        if session.is_closed() {
            return Err(CommandError::RoomClosed);
        }

        let player_id = session.join_player(&request)?;
        session.attach(&player_id, connection.clone())?;
        session.recompute_connectivity();

        let _ = connection.send(ServerMessage::Joined {
            player_id: player_id.clone(),
            room_code: self.code.clone(),
        });
        let _ = connection.send(session.state_message());

        self.after_change(&mut session, Some(&player_id));
        session.broadcast_player_count();
        Ok(player_id)
    }

    /// Apply a command from a joined player over `connection_id`.
    ///
    /// Only the player's current connection may act for them; a connection
    /// superseded by a reattach gets the stale-player error.
    pub async fn apply(
        self: &Arc<Self>,
        issuer: &str,
        connection_id: &str,
        command: Command,
    ) -> CommandResult<()> {
        let mut session = self.session.lock().await;
        if session.is_closed() {
            return Err(CommandError::RoomClosed);
        }
        if !session.is_bound(issuer, connection_id) {
            return Err(CommandError::UnknownPlayer);
        }

        tracing::debug!(room = %self.code, player = %issuer, ?command, "Applying command");
        if session.execute(issuer, command)? == Applied::Changed {
            self.after_change(&mut session, None);
        }
        Ok(())
    }

    /// Explicit leave
    pub async fn leave(self: &Arc<Self>, player_id: &str, connection_id: &str) -> CommandResult<()> {
        let mut session = self.session.lock().await;
        if session.is_closed() {
            return Err(CommandError::RoomClosed);
        }
        if !session.is_bound(player_id, connection_id) {
            return Err(CommandError::UnknownPlayer);
        }

        session.leave(player_id)?;
        self.after_presence_change(&mut session);
        Ok(())
    }

    /// A connection's transport ended
    pub async fn detach(self: &Arc<Self>, player_id: &str, connection_id: &str) {
        let mut session = self.session.lock().await;
        if session.is_closed() {
            return;
        }

        if session.detach(player_id, connection_id) {
            tracing::info!(room = %self.code, player = %player_id, "Player disconnected");
            session.recompute_connectivity();
            self.after_presence_change(&mut session);
        }
    }

    fn after_presence_change(self: &Arc<Self>, session: &mut RoomSession) {
        self.after_change(session, None);
        session.broadcast_player_count();
        if session.live_connection_count() == 0 {
            self.schedule_cleanup(session);
        }
    }

    fn after_change(self: &Arc<Self>, session: &mut RoomSession, exclude: Option<&str>) {
        self.reconcile_turn_timer(session);
        session.broadcast(exclude);
        if let Some(persister) = &self.persister {
            persister.save(session.snapshot());
        }
    }

    /// Keep exactly one turn timer armed while a turn is running.
    ///
    /// The timer is keyed on (turn start, duration): a new turn, a resume or a
    /// duration change re-arms it, anything else leaves it alone. Outside of
    /// an active turn it is cancelled.
    fn reconcile_turn_timer(self: &Arc<Self>, session: &mut RoomSession) {
        let state = session.state();
        let running = match (&state.phase, state.turn_start_time) {
            (GamePhase::Active, Some(start)) => Some((start, state.turn_duration)),
            _ => None,
        };
        let Some((start, duration)) = running else {
            session.turn_timer.cancel();
            return;
        };
        if session.turn_timer.is_armed_for(start, duration) {
            return;
        }

        let deadline = Instant::now() + crate::timer::remaining(start, duration, session.now());
        let room = Arc::downgrade(self);
        session.turn_timer.arm(start, duration, async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(room) = room.upgrade() {
                room.expire_turn(start).await;
            }
        });
    }

    async fn expire_turn(self: &Arc<Self>, start: DateTime<Utc>) {
        let mut session = self.session.lock().await;
        if session.is_closed() {
            return;
        }

        session.turn_timer.release(start);
        if session.on_turn_timeout(start) {
            tracing::info!(room = %self.code, "Turn timed out");
            self.after_change(&mut session, None);
        }
    }

    /// Arm the abandonment timer; a later call replaces an earlier one
    pub(crate) fn schedule_cleanup(self: &Arc<Self>, session: &mut RoomSession) {
        let grace = grace_period(&session.state().phase, &self.config);
        let deadline = Instant::now() + grace;
        let room = Arc::downgrade(self);

        session.cleanup.arm(|epoch| async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(room) = room.upgrade() {
                room.expire_abandoned(epoch).await;
            }
        });
        tracing::info!(room = %self.code, grace_secs = grace.as_secs(), "Room empty, scheduled cleanup");
    }

    async fn expire_abandoned(self: &Arc<Self>, epoch: u64) {
        let mut session = self.session.lock().await;
        if session.is_closed() || !session.cleanup.is_current(epoch) {
            return;
        }
        session.cleanup.release();
        if session.live_connection_count() > 0 {
            return;
        }

        tracing::info!(room = %self.code, "Grace period over, deleting abandoned room");
        self.close_locked(&mut session, Some(RoomClosedReason::Abandoned));
        drop(session);

        if let Some(registry) = self.registry.upgrade() {
            registry.forget(self).await;
        }
    }

    /// Close the room if the idle sweep should take it
    pub(crate) async fn sweep_if_idle(&self, idle_threshold: Duration) -> Option<RoomClosedReason> {
        let mut session = self.session.lock().await;
        if session.is_closed() {
            return None;
        }

        let idle = session.last_activity().elapsed() >= idle_threshold;
        let reason = if session.live_connection_count() == 0 {
            if idle {
                RoomClosedReason::Timeout
            } else {
                RoomClosedReason::AllPlayersLeft
            }
        } else if idle {
            RoomClosedReason::Timeout
        } else {
            return None;
        };

        self.close_locked(&mut session, Some(reason));
        Some(reason)
    }

    /// Close the room: notify clients (if a reason is given) and stop timers.
    /// Closing twice is harmless.
    pub(crate) async fn close(&self, reason: Option<RoomClosedReason>) {
        let mut session = self.session.lock().await;
        self.close_locked(&mut session, reason);
    }

    fn close_locked(&self, session: &mut RoomSession, reason: Option<RoomClosedReason>) {
        if session.is_closed() {
            return;
        }
        if let Some(reason) = reason {
            session.broadcast_room_closed(reason);
        }
        session.closed = true;
        self.closed.store(true, Ordering::SeqCst);
        session.turn_timer.cancel();
        session.cleanup.cancel();
        session.connections.clear();

        if let Some(persister) = &self.persister {
            persister.delete(&self.code);
        }
        tracing::info!(room = %self.code, ?reason, "Room closed");
    }
}

/// Empty lobbies get longer to come back than empty games
pub fn grace_period(phase: &GamePhase, config: &CoordinatorConfig) -> Duration {
    match phase {
        GamePhase::Lobby => config.lobby_grace,
        _ => config.active_grace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RoomRegistry;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    async fn join(room: &Arc<Room>, name: &str) -> (PlayerId, ConnectionHandle, UnboundedReceiver<ServerMessage>) {
        let (handle, rx) = ConnectionHandle::new();
        let id = room
            .join(JoinRequest::named(name), handle.clone())
            .await
            .unwrap();
        (id, handle, rx)
    }

    /// Four seated players in a started game: (red giver, red guesser, blue giver, blue guesser)
    async fn started_room(room: &Arc<Room>) -> Vec<(PlayerId, ConnectionHandle, UnboundedReceiver<ServerMessage>)> {
        let seats = [
            ("rg", Team::Red, Role::ClueGiver),
            ("rx", Team::Red, Role::Guesser),
            ("bg", Team::Blue, Role::ClueGiver),
            ("bx", Team::Blue, Role::Guesser),
        ];
        let mut players = Vec::new();
        for (name, team, role) in seats {
            let player = join(room, name).await;
            room.apply(&player.0, player.1.id(), Command::SetTeamRole { team, role })
                .await
                .unwrap();
            players.push(player);
        }
        room.apply(&players[0].0, players[0].1.id(), Command::StartGame)
            .await
            .unwrap();
        players
    }

    #[tokio::test]
    async fn test_join_sends_welcome_and_notifies_others() {
        let registry = RoomRegistry::new(CoordinatorConfig::default());
        let room = registry.get_or_create("ROOM1").await;

        let (_alice, _h, mut alice_rx) = join(&room, "Alice").await;
        let first = drain(&mut alice_rx);
        assert!(matches!(first[0], ServerMessage::Joined { .. }));
        assert!(matches!(first[1], ServerMessage::StateUpdate { .. }));

        let (_bob, _h2, mut bob_rx) = join(&room, "Bob").await;
        let to_alice = drain(&mut alice_rx);
        assert_eq!(to_alice.len(), 2);
        assert!(matches!(to_alice[0], ServerMessage::StateUpdate { .. }));
        assert!(matches!(
            to_alice[1],
            ServerMessage::PlayerCountUpdate {
                connected: 2,
                total: 2
            }
        ));

        // Bob got exactly one state update, the direct one
        let to_bob = drain(&mut bob_rx);
        let states = to_bob
            .iter()
            .filter(|m| matches!(m, ServerMessage::StateUpdate { .. }))
            .count();
        assert_eq!(states, 1);
    }

    #[tokio::test]
    async fn test_rejected_command_is_not_broadcast() {
        let registry = RoomRegistry::new(CoordinatorConfig::default());
        let room = registry.get_or_create("ROOM1").await;
        let (_alice, _h, mut alice_rx) = join(&room, "Alice").await;
        let (bob, bob_conn, _bob_rx) = join(&room, "Bob").await;
        drain(&mut alice_rx);

        let result = room.apply(&bob, bob_conn.id(), Command::StartGame).await;
        assert!(matches!(result, Err(CommandError::NotOwner(_))));
        assert!(drain(&mut alice_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_timer_switches_team_once() {
        let registry = RoomRegistry::new(CoordinatorConfig::default());
        let room = registry.get_or_create("ROOM1").await;
        let _players = started_room(&room).await;
        let first = room.state().await.current_team;
        assert!(room.turn_timer_pending().await);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(room.state().await.current_team, first.other());

        // The next turn has its own timer
        assert!(room.turn_timer_pending().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duration_change_rearms_without_double_fire() {
        let registry = RoomRegistry::new(CoordinatorConfig::default());
        let room = registry.get_or_create("ROOM1").await;
        let players = started_room(&room).await;
        let first = room.state().await.current_team;

        tokio::time::sleep(Duration::from_secs(20)).await;
        room.apply(&players[0].0, players[0].1.id(), Command::SetTurnDuration { seconds: 120 })
            .await
            .unwrap();

        // The old 60s deadline passes without effect
        tokio::time::sleep(Duration::from_secs(50)).await;
        assert_eq!(room.state().await.current_team, first);

        tokio::time::sleep(Duration::from_secs(80)).await;
        assert_eq!(room.state().await.current_team, first.other());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_turn_never_times_out() {
        let registry = RoomRegistry::new(CoordinatorConfig::default());
        let room = registry.get_or_create("ROOM1").await;
        let players = started_room(&room).await;
        let first = room.state().await.current_team;

        // Drop the current team's guesser
        let guesser = match first {
            Team::Red => &players[1],
            Team::Blue => &players[3],
        };
        room.detach(&guesser.0, guesser.1.id()).await;
        assert!(room.state().await.is_paused());
        assert!(!room.turn_timer_pending().await);

        tokio::time::sleep(Duration::from_secs(300)).await;
        let state = room.state().await;
        assert!(state.is_paused());
        assert_eq!(state.current_team, first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_keeps_time_already_spent() {
        let registry = RoomRegistry::new(CoordinatorConfig::default());
        let room = registry.get_or_create("ROOM1").await;
        let players = started_room(&room).await;
        let first = room.state().await.current_team;
        let guesser = match first {
            Team::Red => &players[1],
            Team::Blue => &players[3],
        };

        tokio::time::sleep(Duration::from_secs(20)).await;
        room.detach(&guesser.0, guesser.1.id()).await;
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert!(room.state().await.is_paused());

        let (handle, _rx) = ConnectionHandle::new();
        let request = JoinRequest {
            player_id: Some(guesser.0.clone()),
            ..JoinRequest::named("rx")
        };
        room.join(request, handle).await.unwrap();
        assert_eq!(room.state().await.phase, GamePhase::Active);

        // 40 of the 60 seconds are left
        tokio::time::sleep(Duration::from_secs(39)).await;
        assert_eq!(room.state().await.current_team, first);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(room.state().await.current_team, first.other());
    }

    #[tokio::test]
    async fn test_closed_room_rejects_commands() {
        let registry = RoomRegistry::new(CoordinatorConfig::default());
        let room = registry.get_or_create("ROOM1").await;
        let (alice, conn, mut rx) = join(&room, "Alice").await;
        drain(&mut rx);

        room.close(Some(RoomClosedReason::Timeout)).await;
        assert!(room.is_closed());
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ServerMessage::RoomClosed {
                reason: RoomClosedReason::Timeout
            }]
        ));

        let result = room.apply(&alice, conn.id(), Command::StartGame).await;
        assert_eq!(result, Err(CommandError::RoomClosed));
    }

    #[test]
    fn test_grace_period_by_phase() {
        let config = CoordinatorConfig::default();
        assert_eq!(grace_period(&GamePhase::Lobby, &config), Duration::from_secs(60));
        assert_eq!(grace_period(&GamePhase::Active, &config), Duration::from_secs(30));
        assert_eq!(
            grace_period(&GamePhase::GameOver { winner: None }, &config),
            Duration::from_secs(30)
        );
    }
}

//! WebSocket message dispatch
//!
//! A connection starts unbound. `Join` binds it to a player in the room named
//! by the connection URL; every later command runs on that player's behalf.
//! Successful commands produce no direct reply (the new state is broadcast);
//! rejections are answered with an `Error` to this connection only.

use crate::connection::ConnectionHandle;
use crate::error::{CommandError, CommandResult};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::RoomRegistry;
use crate::room::Room;
use crate::session::{Command, JoinRequest};
use crate::types::{PlayerId, RoomCode};
use std::sync::Arc;

/// The player a connection acts for
pub struct Binding {
    pub room: Arc<Room>,
    pub player_id: PlayerId,
}

/// Per-connection state owned by the transport task
pub struct ConnectionContext {
    pub room_code: Option<RoomCode>,
    pub connection: ConnectionHandle,
    pub binding: Option<Binding>,
}

impl ConnectionContext {
    pub fn new(room_code: Option<RoomCode>, connection: ConnectionHandle) -> Self {
        Self {
            room_code,
            connection,
            binding: None,
        }
    }

    pub fn player_id(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.player_id.as_str())
    }
}

/// Handle a client message and return an optional direct response
pub async fn handle_message(
    msg: ClientMessage,
    ctx: &mut ConnectionContext,
    registry: &RoomRegistry,
) -> Option<ServerMessage> {
    let result = match msg {
        ClientMessage::Join {
            name,
            player_id,
            avatar,
        } => {
            let request = JoinRequest {
                name,
                player_id,
                avatar,
            };
            handle_join(request, ctx, registry).await
        }
        ClientMessage::Leave => handle_leave(ctx).await,
        other => match command_for(other) {
            Some(command) => handle_command(command, ctx).await,
            None => Ok(()),
        },
    };

    match result {
        Ok(()) => None,
        Err(e) => {
            tracing::debug!(player = ?ctx.player_id(), code = e.code(), "Rejected: {}", e);
            if e.is_stale() {
                ctx.binding = None;
            }
            Some(ServerMessage::from(&e))
        }
    }
}

/// Clean up after the transport ended
pub async fn handle_disconnect(ctx: &mut ConnectionContext) {
    if let Some(binding) = ctx.binding.take() {
        binding
            .room
            .detach(&binding.player_id, ctx.connection.id())
            .await;
    }
}

fn command_for(msg: ClientMessage) -> Option<Command> {
    let command = match msg {
        ClientMessage::Join { .. } | ClientMessage::Leave => return None,
        ClientMessage::SetTeamRole { team, role } => Command::SetTeamRole { team, role },
        ClientMessage::RandomizeTeams => Command::RandomizeTeams,
        ClientMessage::StartGame => Command::StartGame,
        ClientMessage::GiveClue { word, count } => Command::GiveClue { word, count },
        ClientMessage::VoteCard { index } => Command::VoteCard { index },
        ClientMessage::ConfirmReveal { index } => Command::ConfirmReveal { index },
        ClientMessage::EndTurn => Command::EndTurn,
        ClientMessage::EndGame => Command::EndGame,
        ClientMessage::ResumeGame => Command::ResumeGame,
        ClientMessage::Rematch => Command::Rematch,
        ClientMessage::SetTurnDuration { seconds } => Command::SetTurnDuration { seconds },
        ClientMessage::SetWordPack { pack } => Command::SetWordPack { pack },
        ClientMessage::SendChatMessage { text } => Command::SendChatMessage { text },
    };
    Some(command)
}

async fn handle_join(
    request: JoinRequest,
    ctx: &mut ConnectionContext,
    registry: &RoomRegistry,
) -> CommandResult<()> {
    if let Some(binding) = &ctx.binding {
        if !binding.room.is_closed() {
            return Err(CommandError::AlreadyJoined);
        }
        ctx.binding = None;
    }
    let code = ctx.room_code.clone().ok_or(CommandError::InvalidRoomCode)?;

    // A room can close between lookup and join; the retry gets a fresh one
    let mut room = registry.get_or_create(&code).await;
    let player_id = match room.join(request.clone(), ctx.connection.clone()).await {
        Err(CommandError::RoomClosed) => {
            room = registry.get_or_create(&code).await;
            room.join(request, ctx.connection.clone()).await?
        }
        other => other?,
    };

    tracing::info!(room = %code, player = %player_id, "Connection bound");
    ctx.binding = Some(Binding { room, player_id });
    Ok(())
}

async fn handle_leave(ctx: &mut ConnectionContext) -> CommandResult<()> {
    let binding = ctx.binding.take().ok_or(CommandError::NotJoined)?;
    binding
        .room
        .leave(&binding.player_id, ctx.connection.id())
        .await
}

async fn handle_command(command: Command, ctx: &ConnectionContext) -> CommandResult<()> {
    let binding = ctx.binding.as_ref().ok_or(CommandError::NotJoined)?;
    binding
        .room
        .apply(&binding.player_id, ctx.connection.id(), command)
        .await
}

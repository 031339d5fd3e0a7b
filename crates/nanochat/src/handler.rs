//! Per-connection handler: nickname registration and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive RegisterNick until a nickname is accepted
//!   2. Outside a room: list, info, create, enter
//!   3. Inside a room: list, info, rename, send, exit
//!
//! Messages other members cause (chat lines, join/leave, renames) reach
//! this connection through its member channel and a writer task.

use std::sync::Arc;

use nanochat_protocol::{Message, Opcode, encode_frame, recv_message, send_message};
use nanochat_room::{Admission, MemberSender, RoomHandle};
use nanochat_transport::{Connection, ConnectionId, TcpConnection};
use tokio::sync::mpsc;

use crate::NanoChatError;
use crate::server::ServerState;

/// Where the connection is in the conversation.
enum Phase {
    AwaitingNick,
    Lobby { nick: String },
    InRoom { nick: String, room: RoomHandle },
}

/// Drop guard that releases a nickname if the handler unwinds before
/// its normal cleanup runs.
///
/// Since `Drop` is synchronous, we spawn a fire-and-forget task for the
/// async registry call.
struct Registration {
    nick: Option<String>,
    state: Arc<ServerState>,
}

impl Registration {
    async fn release(mut self) {
        if let Some(nick) = self.nick.take() {
            self.state.registry.remove_user(&nick).await;
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(nick) = self.nick.take() {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                state.registry.remove_user(&nick).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
///
/// However the conversation ends, the nickname and room membership are
/// released and the socket is closed before this returns.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), NanoChatError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (member_tx, member_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(forward_room_messages(Arc::clone(&conn), member_rx));

    let mut registration = Registration {
        nick: None,
        state: Arc::clone(&state),
    };
    let result = serve(&conn, &state, &member_tx, &mut registration).await;

    // Cleanup: leave the room, free the nickname, close the socket.
    registration.release().await;
    writer.abort();
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    match &result {
        Ok(()) => tracing::info!(%conn_id, "connection closed"),
        Err(e) => tracing::info!(%conn_id, error = %e, "connection dropped"),
    }
    result
}

/// The receive loop. Returns when the peer closes or on the first
/// communication failure.
async fn serve(
    conn: &TcpConnection,
    state: &ServerState,
    member_tx: &MemberSender,
    registration: &mut Registration,
) -> Result<(), NanoChatError> {
    let mut phase = Phase::AwaitingNick;

    while let Some(msg) = recv_message(conn).await? {
        tracing::debug!(conn_id = %conn.id(), op = %msg.opcode(), "received");
        phase = match phase {
            Phase::AwaitingNick => match msg {
                Message::Room {
                    opcode: Opcode::RegisterNick,
                    name,
                } => register_nick(conn, state, name, registration).await?,
                other => {
                    ignore(conn.id(), "awaiting nickname", &other);
                    Phase::AwaitingNick
                }
            },
            Phase::Lobby { nick } => lobby(conn, state, member_tx, nick, msg).await?,
            Phase::InRoom { nick, room } => in_room(conn, state, nick, room, msg).await?,
        };
    }
    Ok(())
}

async fn register_nick(
    conn: &TcpConnection,
    state: &ServerState,
    nick: String,
    registration: &mut Registration,
) -> Result<Phase, NanoChatError> {
    match state.registry.register_user(&nick).await {
        Ok(()) => {
            registration.nick = Some(nick.clone());
            reply(conn, Message::control(Opcode::ValidNick)).await?;
            Ok(Phase::Lobby { nick })
        }
        Err(e) => {
            tracing::debug!(conn_id = %conn.id(), error = %e, "nickname refused");
            reply(conn, Message::control(Opcode::DuplicatedNick)).await?;
            Ok(Phase::AwaitingNick)
        }
    }
}

async fn lobby(
    conn: &TcpConnection,
    state: &ServerState,
    member_tx: &MemberSender,
    nick: String,
    msg: Message,
) -> Result<Phase, NanoChatError> {
    match msg {
        Message::Control {
            opcode: Opcode::RoomList,
        } => room_list(conn, state).await?,
        Message::Room {
            opcode: Opcode::RoomInfo,
            name,
        } => room_info(conn, state, &name).await?,
        Message::Room {
            opcode: Opcode::CreateRoom,
            name,
        } => {
            let answer = match state.registry.create_room(&name).await {
                Ok(_) => Opcode::CreateRoomOk,
                Err(e) => {
                    tracing::debug!(%nick, error = %e, "create refused");
                    Opcode::InvalidRoom
                }
            };
            reply(conn, Message::control(answer)).await?;
        }
        Message::Room {
            opcode: Opcode::RoomEnter,
            name,
        } => {
            match state.registry.enter_room(&nick, &name, member_tx.clone()).await {
                Ok(Admission::Admitted(room)) => {
                    tracing::info!(%nick, room = %name, "entered room");
                    reply(conn, Message::control(Opcode::RoomEnterOk)).await?;
                    return Ok(Phase::InRoom { nick, room });
                }
                Ok(Admission::Refused) => {
                    tracing::debug!(%nick, room = %name, "admission refused");
                    reply(conn, Message::control(Opcode::InvalidRoom)).await?;
                }
                Err(e) => {
                    tracing::debug!(%nick, error = %e, "enter refused");
                    reply(conn, Message::control(Opcode::InvalidRoom)).await?;
                }
            }
        }
        other => ignore(conn.id(), "outside a room", &other),
    }
    Ok(Phase::Lobby { nick })
}

async fn in_room(
    conn: &TcpConnection,
    state: &ServerState,
    nick: String,
    room: RoomHandle,
    msg: Message,
) -> Result<Phase, NanoChatError> {
    match msg {
        Message::Control {
            opcode: Opcode::RoomList,
        } => room_list(conn, state).await?,
        Message::Room {
            opcode: Opcode::RoomInfo,
            name,
        } => room_info(conn, state, &name).await?,
        Message::Room {
            opcode: Opcode::SendText,
            name: text,
        } => {
            // What members receive carries the sender too, so it can outgrow
            // a frame the request itself fit in.
            if let Err(e) = encode_frame(&Message::receive_text(nick.as_str(), text.as_str())) {
                tracing::warn!(%nick, error = %e, "dropping chat line that cannot be delivered");
            } else if let Err(e) = room.broadcast(&nick, &text).await {
                tracing::warn!(%nick, error = %e, "broadcast failed");
            }
        }
        Message::Room {
            opcode: Opcode::RenameRoom,
            name: new_name,
        } => {
            // On success the room itself tells every member, us included.
            let renamed = match room.name().await {
                Ok(old) => state.registry.rename_room(&old, &new_name).await,
                Err(e) => Err(e),
            };
            if let Err(e) = renamed {
                tracing::debug!(%nick, error = %e, "rename refused");
                reply(conn, Message::control(Opcode::InvalidRoom)).await?;
            }
        }
        Message::Control {
            opcode: Opcode::ExitRoom,
        } => {
            state.registry.leave_room(&nick).await;
            tracing::info!(%nick, "left room");
            return Ok(Phase::Lobby { nick });
        }
        other => ignore(conn.id(), "inside a room", &other),
    }
    Ok(Phase::InRoom { nick, room })
}

async fn room_list(conn: &TcpConnection, state: &ServerState) -> Result<(), NanoChatError> {
    let rooms = state.registry.list_rooms().await;
    reply(conn, Message::room_list_ok(rooms)).await
}

async fn room_info(
    conn: &TcpConnection,
    state: &ServerState,
    name: &str,
) -> Result<(), NanoChatError> {
    let answer = match state.registry.room_info(name).await {
        Ok(desc) => Message::room_info_ok(desc),
        Err(_) => Message::control(Opcode::InvalidRoom),
    };
    reply(conn, answer).await
}

async fn reply(conn: &TcpConnection, msg: Message) -> Result<(), NanoChatError> {
    send_message(conn, &msg).await?;
    Ok(())
}

fn ignore(conn_id: ConnectionId, phase: &str, msg: &Message) {
    tracing::warn!(%conn_id, op = %msg.opcode(), phase, "ignoring unexpected operation");
}

/// Writes whatever the rooms push for this member.
///
/// A message that cannot be put on the wire is skipped; only a broken
/// connection stops the writer.
async fn forward_room_messages(
    conn: Arc<TcpConnection>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        match send_message(&*conn, &msg).await {
            Ok(()) => {}
            Err(e) if e.is_unsendable() => {
                tracing::warn!(conn_id = %conn.id(), op = %msg.opcode(), error = %e, "skipping undeliverable push");
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "member send failed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use nanochat_transport::{TcpTransport, Transport};

    use super::*;

    #[tokio::test]
    async fn test_writer_skips_pushes_that_do_not_fit() {
        let mut transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        let client = TcpConnection::connect(addr).await.unwrap();
        let server = Arc::new(transport.accept().await.unwrap());

        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(forward_room_messages(server, rx));

        let huge = "x".repeat(u16::MAX as usize);
        tx.send(Message::receive_text("alice", huge.as_str())).unwrap();
        tx.send(Message::receive_text("alice", "a\nb")).unwrap();
        tx.send(Message::receive_text("alice", "small")).unwrap();

        let got = recv_message(&client).await.unwrap();
        assert_eq!(got, Some(Message::receive_text("alice", "small")));
        assert!(!writer.is_finished());
        writer.abort();
    }
}

//! The client side of a chat connection.
//!
//! A [`ClientSession`] owns the TCP connection and a reader task that
//! forwards every inbound message into a channel. Requests wait on that
//! channel for their reply; anything else that arrives in the meantime
//! (chat lines, join/leave notices) becomes a [`Notice`] alongside the
//! reply. Between commands the driver waits on [`ClientSession::next_inbound`]
//! and the keyboard at the same time.

use std::net::SocketAddr;
use std::sync::Arc;

use nanochat_protocol::{
    Message, Opcode, ProtocolError, RoomDescription, encode_frame, now_millis, recv_message,
    send_message,
};
use nanochat_transport::{Connection, TcpConnection};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{Command, Notice, SessionError, SessionState};

type Inbound = Result<Message, ProtocolError>;

/// One user's conversation with a chat server.
pub struct ClientSession {
    conn: Arc<TcpConnection>,
    inbox: mpsc::UnboundedReceiver<Inbound>,
    reader: JoinHandle<()>,
    /// Set once the inbound stream has ended.
    server_gone: bool,
    state: SessionState,
    nick: Option<String>,
    room: Option<String>,
}

impl ClientSession {
    /// Connects to the chat server at `addr`.
    ///
    /// The new session starts in [`SessionState::PreRegister`].
    pub async fn connect(addr: SocketAddr) -> Result<Self, SessionError> {
        let conn = TcpConnection::connect(addr)
            .await
            .map_err(|source| SessionError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(id = %conn.id(), peer = %conn.peer_addr(), "connected to chat server");

        let conn = Arc::new(conn);
        let (tx, inbox) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(Arc::clone(&conn), tx));

        Ok(Self {
            conn,
            inbox,
            reader,
            server_gone: false,
            state: SessionState::PreRegister,
            nick: None,
            room: None,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The registered nickname, once the server accepted one.
    pub fn nick(&self) -> Option<&str> {
        self.nick.as_deref()
    }

    /// The room the user is in, tracking renames.
    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Runs one command.
    ///
    /// Commands not valid in the current state fail without any I/O, and
    /// so do messages too large or malformed to send. On a communication
    /// failure inside a room the session falls back to
    /// [`SessionState::OffRoom`]; if the server is gone it becomes
    /// [`SessionState::Disconnected`].
    pub async fn execute(&mut self, command: Command) -> Result<Vec<Notice>, SessionError> {
        self.state.permits(&command)?;

        let result = match self.dispatch(command).await {
            Err(SessionError::Communication(e)) if e.is_unsendable() => {
                Err(SessionError::Unsendable(e))
            }
            other => other,
        };
        if let Err(e) = &result {
            if e.is_communication() {
                self.communication_failed(e);
            }
        }
        result
    }

    /// Waits for the next message the server pushes on its own.
    ///
    /// Cancel-safe, so it can sit in a `select!` next to the keyboard.
    /// Never resolves once the session is disconnected or has quit.
    pub async fn next_inbound(&mut self) -> Notice {
        loop {
            if matches!(self.state, SessionState::Disconnected | SessionState::Quit) {
                return std::future::pending().await;
            }
            match self.inbox.recv().await {
                Some(Ok(msg)) => {
                    if let Some(notice) = self.handle_incoming(msg) {
                        return notice;
                    }
                }
                Some(Err(e)) => {
                    self.server_gone = true;
                    let err = SessionError::Communication(e);
                    self.communication_failed(&err);
                    return Notice::ConnectionLost(err.to_string());
                }
                None => {
                    self.server_gone = true;
                    let err = SessionError::ConnectionClosed;
                    self.communication_failed(&err);
                    return Notice::ConnectionLost(err.to_string());
                }
            }
        }
    }

    /// Turns an unsolicited server message into a notice.
    ///
    /// Returns `None` for messages that only make sense as a reply.
    pub fn handle_incoming(&mut self, msg: Message) -> Option<Notice> {
        let current = self.room.clone().unwrap_or_default();
        match msg {
            Message::User {
                opcode: Opcode::ReceiveText,
                name,
                text,
            } => Some(Notice::Chat { from: name, text }),
            Message::Room {
                opcode: Opcode::UserIn,
                name,
            } => Some(Notice::UserJoined {
                nick: name,
                room: current,
            }),
            Message::Room {
                opcode: Opcode::UserOut,
                name,
            } => Some(Notice::UserLeft {
                nick: name,
                room: current,
            }),
            Message::Room {
                opcode: Opcode::RenameRoomOk,
                name,
            } => {
                self.room = Some(name.clone());
                Some(Notice::RoomRenamed(name))
            }
            other => {
                tracing::warn!(op = %other.opcode(), state = %self.state, "ignoring unsolicited message");
                None
            }
        }
    }

    async fn dispatch(&mut self, command: Command) -> Result<Vec<Notice>, SessionError> {
        match command {
            Command::Help => Ok(vec![Notice::Help]),
            Command::Quit => {
                self.quit().await;
                Ok(vec![Notice::Bye])
            }
            Command::Nick(nick) => self.register(nick).await,
            Command::RoomList => self.room_list().await,
            Command::Enter(room) => self.enter(room).await,
            Command::Create(room) => self.create(room).await,
            Command::Info(room) => {
                let room = room.or_else(|| self.room.clone()).unwrap_or_default();
                self.info(room).await
            }
            Command::Send(text) => {
                // Members get the line with our nickname attached; it must fit too.
                let nick = self.nick.as_deref().unwrap_or_default();
                encode_frame(&Message::receive_text(nick, text.as_str()))?;
                send_message(&*self.conn, &Message::room(Opcode::SendText, text)).await?;
                Ok(Vec::new())
            }
            Command::Exit => self.exit().await,
            Command::Rename(name) => self.rename(name).await,
        }
    }

    async fn register(&mut self, nick: String) -> Result<Vec<Notice>, SessionError> {
        let request = Message::room(Opcode::RegisterNick, nick.as_str());
        let (reply, mut notices) = self
            .request(&request, |m| {
                matches!(m.opcode(), Opcode::ValidNick | Opcode::DuplicatedNick)
            })
            .await?;
        if reply.opcode() == Opcode::ValidNick {
            tracing::info!(%nick, "nickname registered");
            self.nick = Some(nick.clone());
            self.state = SessionState::OffRoom;
            notices.push(Notice::NickAccepted(nick));
        } else {
            notices.push(Notice::NickDuplicated(nick));
        }
        Ok(notices)
    }

    async fn room_list(&mut self) -> Result<Vec<Notice>, SessionError> {
        let (reply, mut notices) = self
            .request(&Message::control(Opcode::RoomList), |m| {
                m.opcode() == Opcode::RoomListOk
            })
            .await?;
        let opcode = reply.opcode();
        let Message::MultiInfo { rooms, .. } = reply else {
            return Err(SessionError::UnexpectedReply(opcode));
        };
        notices.push(Notice::RoomList {
            rooms: rooms.into_descriptions(),
            now: now_millis(),
        });
        Ok(notices)
    }

    async fn enter(&mut self, room: String) -> Result<Vec<Notice>, SessionError> {
        let request = Message::room(Opcode::RoomEnter, room.as_str());
        let (reply, mut notices) = self
            .request(&request, |m| {
                matches!(m.opcode(), Opcode::RoomEnterOk | Opcode::InvalidRoom)
            })
            .await?;
        if reply.opcode() == Opcode::RoomEnterOk {
            tracing::info!(room = %room, "entered room");
            self.room = Some(room.clone());
            self.state = SessionState::InRoom;
            notices.push(Notice::Joined(room));
        } else {
            notices.push(Notice::JoinRefused(room));
        }
        Ok(notices)
    }

    async fn create(&mut self, room: String) -> Result<Vec<Notice>, SessionError> {
        let request = Message::room(Opcode::CreateRoom, room.as_str());
        let (reply, mut notices) = self
            .request(&request, |m| {
                matches!(m.opcode(), Opcode::CreateRoomOk | Opcode::InvalidRoom)
            })
            .await?;
        notices.push(if reply.opcode() == Opcode::CreateRoomOk {
            Notice::Created(room)
        } else {
            Notice::CreateRefused(room)
        });
        Ok(notices)
    }

    async fn info(&mut self, room: String) -> Result<Vec<Notice>, SessionError> {
        let request = Message::room(Opcode::RoomInfo, room.as_str());
        let (reply, mut notices) = self
            .request(&request, |m| {
                matches!(m.opcode(), Opcode::RoomInfoOk | Opcode::InvalidRoom)
            })
            .await?;
        match reply {
            Message::Info {
                name,
                time,
                members,
                ..
            } => notices.push(Notice::RoomInfo {
                room: RoomDescription {
                    name,
                    members,
                    last_message: time,
                },
                now: now_millis(),
            }),
            _ => notices.push(Notice::NoSuchRoom(room)),
        }
        Ok(notices)
    }

    async fn exit(&mut self) -> Result<Vec<Notice>, SessionError> {
        let room = self.room.take().unwrap_or_default();
        // The server removes us whether or not this reaches it.
        self.state = SessionState::OffRoom;
        send_message(&*self.conn, &Message::control(Opcode::ExitRoom)).await?;
        tracing::info!(room = %room, "left room");
        Ok(vec![Notice::Left(room)])
    }

    async fn rename(&mut self, new_name: String) -> Result<Vec<Notice>, SessionError> {
        let request = Message::room(Opcode::RenameRoom, new_name.as_str());
        // Someone else's rename can arrive first; only our name is the reply.
        let (reply, mut notices) = self
            .request(&request, |m| match m {
                Message::Room {
                    opcode: Opcode::RenameRoomOk,
                    name,
                } => *name == new_name,
                other => other.opcode() == Opcode::InvalidRoom,
            })
            .await?;
        if reply.opcode() == Opcode::RenameRoomOk {
            let from = self.room.replace(new_name.clone()).unwrap_or_default();
            notices.push(Notice::Renamed { from, to: new_name });
        } else {
            notices.push(Notice::RenameRefused(new_name));
        }
        Ok(notices)
    }

    async fn quit(&mut self) {
        if let Err(e) = self.conn.close().await {
            tracing::debug!(error = %e, "error closing chat connection");
        }
        self.reader.abort();
        self.state = SessionState::Quit;
        self.room = None;
    }

    /// Sends `request` and waits for the message `is_reply` accepts,
    /// collecting notices for whatever arrives before it.
    async fn request(
        &mut self,
        request: &Message,
        is_reply: impl Fn(&Message) -> bool,
    ) -> Result<(Message, Vec<Notice>), SessionError> {
        send_message(&*self.conn, request).await?;

        let mut notices = Vec::new();
        loop {
            match self.inbox.recv().await {
                Some(Ok(msg)) if is_reply(&msg) => return Ok((msg, notices)),
                Some(Ok(msg)) => {
                    let opcode = msg.opcode();
                    match self.handle_incoming(msg) {
                        Some(notice) => notices.push(notice),
                        None => return Err(SessionError::UnexpectedReply(opcode)),
                    }
                }
                Some(Err(e)) => {
                    self.server_gone = true;
                    return Err(e.into());
                }
                None => {
                    self.server_gone = true;
                    return Err(SessionError::ConnectionClosed);
                }
            }
        }
    }

    fn communication_failed(&mut self, err: &SessionError) {
        tracing::warn!(error = %err, state = %self.state, "communication failure");
        if self.state == SessionState::InRoom {
            self.state = SessionState::OffRoom;
            self.room = None;
        }
        if self.server_gone {
            self.state = SessionState::Disconnected;
            self.nick = None;
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Forwards inbound messages until the connection ends.
///
/// The channel closing tells the session the server is gone.
async fn read_loop(conn: Arc<TcpConnection>, tx: mpsc::UnboundedSender<Inbound>) {
    loop {
        match recv_message(&*conn).await {
            Ok(Some(msg)) => {
                if tx.send(Ok(msg)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(id = %conn.id(), "chat server closed the connection");
                break;
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
}

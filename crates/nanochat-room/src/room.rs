//! Room actor: an isolated Tokio task that owns one chat room.
//!
//! Each room runs in its own task and is driven through an mpsc channel,
//! so every membership change and broadcast in a room happens one at a
//! time, in mailbox order, without blocking any other room.

use std::collections::BTreeMap;
use std::sync::Arc;

use nanochat_protocol::{Message, Opcode, RoomDescription, now_millis};
use tokio::sync::{mpsc, oneshot};

use crate::{AdmissionPolicy, RoomError};

/// Channel sender for delivering outbound messages to one member.
pub type MemberSender = mpsc::UnboundedSender<Message>;

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Commands sent to a room actor through its channel.
///
/// Every command carries a reply channel, so callers observe the effect
/// (including fan-out to members) before they continue.
pub(crate) enum RoomCommand {
    Admit {
        nick: String,
        sender: MemberSender,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        nick: String,
        reply: oneshot::Sender<bool>,
    },
    Broadcast {
        sender: String,
        text: String,
        reply: oneshot::Sender<usize>,
    },
    Rename {
        new_name: String,
        reply: oneshot::Sender<()>,
    },
    Describe {
        reply: oneshot::Sender<RoomDescription>,
    },
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone. A renamed room keeps the same handle, so everyone
/// holding it sees the new name.
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle").finish_non_exhaustive()
    }
}

impl RoomHandle {
    /// Returns `true` if both handles drive the same room.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Returns a snapshot of the room.
    pub async fn describe(&self) -> Result<RoomDescription, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(RoomCommand::Describe { reply }, rx).await
    }

    /// Returns the room's current name.
    pub async fn name(&self) -> Result<String, RoomError> {
        Ok(self.describe().await?.name)
    }

    /// Sends `text` from `sender` to every other member.
    ///
    /// Returns how many members it was handed to. A member whose
    /// connection is gone is skipped and logged.
    pub async fn broadcast(
        &self,
        sender: &str,
        text: &str,
    ) -> Result<usize, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Broadcast {
                sender: sender.to_string(),
                text: text.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    pub(crate) async fn admit(
        &self,
        nick: &str,
        sender: MemberSender,
    ) -> Result<bool, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Admit {
                nick: nick.to_string(),
                sender,
                reply,
            },
            rx,
        )
        .await
    }

    pub(crate) async fn remove(&self, nick: &str) -> Result<bool, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Remove {
                nick: nick.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    pub(crate) async fn rename(&self, new_name: &str) -> Result<(), RoomError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            RoomCommand::Rename {
                new_name: new_name.to_string(),
                reply,
            },
            rx,
        )
        .await
    }

    async fn request<T>(
        &self,
        cmd: RoomCommand,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable)?;
        rx.await.map_err(|_| RoomError::Unavailable)
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    name: String,
    /// Per-member outbound channels, ordered by nickname.
    members: BTreeMap<String, MemberSender>,
    /// Millis since the epoch of the last broadcast, `0` if none.
    last_message: u64,
    admission: Arc<dyn AdmissionPolicy>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop until every handle is dropped.
    async fn run(mut self) {
        tracing::debug!(room = %self.name, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Admit {
                    nick,
                    sender,
                    reply,
                } => {
                    let _ = reply.send(self.handle_admit(nick, sender));
                }
                RoomCommand::Remove { nick, reply } => {
                    let _ = reply.send(self.handle_remove(&nick));
                }
                RoomCommand::Broadcast {
                    sender,
                    text,
                    reply,
                } => {
                    let _ = reply.send(self.handle_broadcast(&sender, &text));
                }
                RoomCommand::Rename { new_name, reply } => {
                    self.handle_rename(new_name);
                    let _ = reply.send(());
                }
                RoomCommand::Describe { reply } => {
                    let _ = reply.send(self.describe());
                }
            }
        }

        tracing::debug!(room = %self.name, "room actor stopped");
    }

    fn handle_admit(&mut self, nick: String, sender: MemberSender) -> bool {
        let already_member = self.members.contains_key(&nick);
        if !self.admission.admits(&self.name, &nick, already_member) {
            tracing::debug!(room = %self.name, %nick, "admission refused");
            return false;
        }

        // Tell the existing members first; the newcomer gets no UserIn
        // about itself.
        let joined = Message::room(Opcode::UserIn, nick.as_str());
        self.send_to_all(&joined, None);

        self.members.insert(nick.clone(), sender);
        tracing::info!(
            room = %self.name,
            %nick,
            members = self.members.len(),
            "member joined"
        );
        true
    }

    fn handle_remove(&mut self, nick: &str) -> bool {
        if self.members.remove(nick).is_none() {
            return false;
        }
        tracing::info!(
            room = %self.name,
            %nick,
            members = self.members.len(),
            "member left"
        );
        let left = Message::room(Opcode::UserOut, nick);
        self.send_to_all(&left, None);
        true
    }

    fn handle_broadcast(&mut self, sender: &str, text: &str) -> usize {
        let msg = Message::receive_text(sender, text);
        let delivered = self.send_to_all(&msg, Some(sender));
        self.last_message = now_millis();
        tracing::debug!(room = %self.name, %sender, delivered, "broadcast");
        delivered
    }

    fn handle_rename(&mut self, new_name: String) {
        tracing::info!(from = %self.name, to = %new_name, "room renamed");
        self.name = new_name;
        let renamed = Message::room(Opcode::RenameRoomOk, self.name.as_str());
        self.send_to_all(&renamed, None);
    }

    /// Sends `msg` to every member except `skip`. Returns the number of
    /// successful hand-offs; failures are logged and skipped.
    fn send_to_all(&self, msg: &Message, skip: Option<&str>) -> usize {
        let mut delivered = 0;
        for (nick, sender) in &self.members {
            if Some(nick.as_str()) == skip {
                continue;
            }
            match sender.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(
                    room = %self.name,
                    %nick,
                    op = %msg.opcode(),
                    "member unreachable, skipping"
                ),
            }
        }
        delivered
    }

    fn describe(&self) -> RoomDescription {
        RoomDescription {
            name: self.name.clone(),
            members: self.members.keys().cloned().collect(),
            last_message: self.last_message,
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room(
    name: String,
    admission: Arc<dyn AdmissionPolicy>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);

    let actor = RoomActor {
        name,
        members: BTreeMap::new(),
        last_message: 0,
        admission,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { sender: tx }
}

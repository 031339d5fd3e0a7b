//! Room registry: the server's authoritative set of rooms and nicknames.
//!
//! Registry-level changes (nicknames, room creation and renaming, who is
//! in which room) go through one coarse lock. Work inside a room (admission,
//! broadcast, snapshots) is done by that room's actor, so a busy room never
//! holds the registry lock while it fans out.
//!
//! Lock order is always registry first, then room.

use std::collections::HashMap;
use std::sync::Arc;

use nanochat_protocol::{RoomDescription, is_wire_safe_name};
use tokio::sync::Mutex;

use crate::room::spawn_room;
use crate::{AdmissionPolicy, MemberSender, OpenAdmission, RoomError, RoomHandle};

/// Outcome of a room entry request for an existing room.
#[derive(Debug)]
pub enum Admission {
    /// The user is now a member; keep the handle to talk to the room.
    Admitted(RoomHandle),
    /// The room's admission policy said no.
    Refused,
}

struct Inner {
    rooms: HashMap<String, RoomHandle>,
    /// Registered nicknames and the room each one is currently in.
    users: HashMap<String, Option<RoomHandle>>,
}

/// Shared registry of rooms and registered nicknames.
///
/// Built once at startup and shared behind an `Arc`.
pub struct RoomRegistry {
    inner: Mutex<Inner>,
    admission: Arc<dyn AdmissionPolicy>,
}

impl RoomRegistry {
    /// Creates an empty registry that admits anyone not already a member.
    pub fn new() -> Self {
        Self::with_admission(Arc::new(OpenAdmission))
    }

    /// Creates an empty registry whose rooms use `admission`.
    pub fn with_admission(admission: Arc<dyn AdmissionPolicy>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rooms: HashMap::new(),
                users: HashMap::new(),
            }),
            admission,
        }
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Claims `nick` for a connection.
    pub async fn register_user(&self, nick: &str) -> Result<(), RoomError> {
        if !is_wire_safe_name(nick) {
            return Err(RoomError::InvalidName(nick.to_string()));
        }
        let mut inner = self.inner.lock().await;
        if inner.users.contains_key(nick) {
            return Err(RoomError::DuplicateNickname(nick.to_string()));
        }
        inner.users.insert(nick.to_string(), None);
        tracing::info!(%nick, users = inner.users.len(), "user registered");
        Ok(())
    }

    /// Releases `nick`, taking it out of its room first.
    ///
    /// Returns `false` if it was not registered.
    pub async fn remove_user(&self, nick: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(location) = inner.users.remove(nick) else {
            return false;
        };
        if let Some(room) = location {
            if let Err(e) = room.remove(nick).await {
                tracing::debug!(%nick, error = %e, "room gone during removal");
            }
        }
        tracing::info!(%nick, users = inner.users.len(), "user removed");
        true
    }

    // -----------------------------------------------------------------------
    // Rooms
    // -----------------------------------------------------------------------

    /// Creates an empty room called `name`.
    pub async fn create_room(&self, name: &str) -> Result<RoomHandle, RoomError> {
        if !is_wire_safe_name(name) {
            return Err(RoomError::InvalidName(name.to_string()));
        }
        let mut inner = self.inner.lock().await;
        if inner.rooms.contains_key(name) {
            return Err(RoomError::NameInUse(name.to_string()));
        }
        let handle = spawn_room(name.to_string(), Arc::clone(&self.admission));
        inner.rooms.insert(name.to_string(), handle.clone());
        tracing::info!(room = %name, rooms = inner.rooms.len(), "room created");
        Ok(handle)
    }

    /// Renames room `old` to `new`.
    ///
    /// On success every member has been sent `RenameRoomOk` and every
    /// holder of the room's handle sees the new name. On failure nothing
    /// changes.
    pub async fn rename_room(
        &self,
        old: &str,
        new: &str,
    ) -> Result<RoomHandle, RoomError> {
        if !is_wire_safe_name(new) {
            return Err(RoomError::InvalidName(new.to_string()));
        }
        let mut inner = self.inner.lock().await;
        if inner.rooms.contains_key(new) {
            return Err(RoomError::NameInUse(new.to_string()));
        }
        let handle = inner
            .rooms
            .remove(old)
            .ok_or_else(|| RoomError::NoSuchRoom(old.to_string()))?;

        if let Err(e) = handle.rename(new).await {
            inner.rooms.insert(old.to_string(), handle);
            return Err(e);
        }
        inner.rooms.insert(new.to_string(), handle.clone());
        Ok(handle)
    }

    /// Puts registered user `nick` into room `name`.
    ///
    /// A user already inside some room is refused.
    pub async fn enter_room(
        &self,
        nick: &str,
        name: &str,
        sender: MemberSender,
    ) -> Result<Admission, RoomError> {
        let mut inner = self.inner.lock().await;
        let handle = inner
            .rooms
            .get(name)
            .cloned()
            .ok_or_else(|| RoomError::NoSuchRoom(name.to_string()))?;
        let location = inner
            .users
            .get_mut(nick)
            .ok_or_else(|| RoomError::UnknownUser(nick.to_string()))?;
        if location.is_some() {
            return Ok(Admission::Refused);
        }

        if !handle.admit(nick, sender).await? {
            return Ok(Admission::Refused);
        }
        *location = Some(handle.clone());
        Ok(Admission::Admitted(handle))
    }

    /// Takes `nick` out of whatever room it is in.
    ///
    /// Returns the room it left, if any.
    pub async fn leave_room(&self, nick: &str) -> Option<RoomHandle> {
        let mut inner = self.inner.lock().await;
        let room = inner.users.get_mut(nick)?.take()?;
        if let Err(e) = room.remove(nick).await {
            tracing::debug!(%nick, error = %e, "room gone during leave");
        }
        Some(room)
    }

    /// Returns the handle of room `name`.
    pub async fn room(&self, name: &str) -> Option<RoomHandle> {
        self.inner.lock().await.rooms.get(name).cloned()
    }

    /// Returns a snapshot of room `name`.
    pub async fn room_info(&self, name: &str) -> Result<RoomDescription, RoomError> {
        let handle = self
            .room(name)
            .await
            .ok_or_else(|| RoomError::NoSuchRoom(name.to_string()))?;
        handle.describe().await
    }

    /// Returns a snapshot of every room, ordered by name.
    pub async fn list_rooms(&self) -> Vec<RoomDescription> {
        // Clone the handles and drop the lock before talking to rooms.
        let handles: Vec<RoomHandle> =
            self.inner.lock().await.rooms.values().cloned().collect();

        let mut descs = Vec::with_capacity(handles.len());
        for handle in &handles {
            match handle.describe().await {
                Ok(desc) => descs.push(desc),
                Err(e) => tracing::debug!(error = %e, "skipping room"),
            }
        }
        descs.sort_by(|a, b| a.name.cmp(&b.name));
        descs
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

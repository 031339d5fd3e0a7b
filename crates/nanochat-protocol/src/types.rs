//! Core protocol types for nanoChat's wire format.
//!
//! Every chat message carries an [`Opcode`]. Each opcode belongs to
//! exactly one [`MessageKind`], and the kind decides which fields travel
//! with it. [`Message`] is the closed set of those shapes.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Opcode
// ---------------------------------------------------------------------------

/// The operation a message performs.
///
/// The numeric codes are stable and match the canonical names used in the
/// `operation` field. Names are compared case-insensitively on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Opcode {
    RegisterNick = 1,
    DuplicatedNick = 2,
    ValidNick = 3,
    RoomList = 4,
    RoomListOk = 5,
    RoomEnter = 6,
    InvalidRoom = 7,
    RoomEnterOk = 8,
    RoomInfo = 9,
    RoomInfoOk = 10,
    SendText = 11,
    ReceiveText = 12,
    ExitRoom = 13,
    CreateRoom = 14,
    CreateRoomOk = 15,
    RenameRoom = 16,
    RenameRoomOk = 17,
    UserIn = 18,
    UserOut = 19,
}

impl Opcode {
    /// Every opcode, in numeric order.
    pub const ALL: [Opcode; 19] = [
        Self::RegisterNick,
        Self::DuplicatedNick,
        Self::ValidNick,
        Self::RoomList,
        Self::RoomListOk,
        Self::RoomEnter,
        Self::InvalidRoom,
        Self::RoomEnterOk,
        Self::RoomInfo,
        Self::RoomInfoOk,
        Self::SendText,
        Self::ReceiveText,
        Self::ExitRoom,
        Self::CreateRoom,
        Self::CreateRoomOk,
        Self::RenameRoom,
        Self::RenameRoomOk,
        Self::UserIn,
        Self::UserOut,
    ];

    /// Returns the numeric code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks up an opcode by its numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Returns the canonical operation name used on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Self::RegisterNick => "RegisterNick",
            Self::DuplicatedNick => "DuplicatedNick",
            Self::ValidNick => "ValidNick",
            Self::RoomList => "RoomList",
            Self::RoomListOk => "RoomListOk",
            Self::RoomEnter => "RoomEnter",
            Self::InvalidRoom => "InvalidRoom",
            Self::RoomEnterOk => "RoomEnterOk",
            Self::RoomInfo => "RoomInfo",
            Self::RoomInfoOk => "RoomInfoOk",
            Self::SendText => "SendText",
            Self::ReceiveText => "ReceiveText",
            Self::ExitRoom => "ExitRoom",
            Self::CreateRoom => "CreateRoom",
            Self::CreateRoomOk => "CreateRoomOk",
            Self::RenameRoom => "RenameRoom",
            Self::RenameRoomOk => "RenameRoomOk",
            Self::UserIn => "UserIn",
            Self::UserOut => "UserOut",
        }
    }

    /// Looks up an opcode by operation name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    /// Returns the message kind that carries this opcode.
    pub fn kind(self) -> MessageKind {
        match self {
            Self::DuplicatedNick
            | Self::ValidNick
            | Self::RoomList
            | Self::InvalidRoom
            | Self::RoomEnterOk
            | Self::ExitRoom
            | Self::CreateRoomOk => MessageKind::Control,

            Self::RegisterNick
            | Self::RoomEnter
            | Self::RoomInfo
            | Self::SendText
            | Self::CreateRoom
            | Self::RenameRoom
            | Self::RenameRoomOk
            | Self::UserIn
            | Self::UserOut => MessageKind::Room,

            Self::RoomInfoOk => MessageKind::Info,
            Self::RoomListOk => MessageKind::MultiInfo,
            Self::ReceiveText => MessageKind::User,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The field layout family a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Operation only.
    Control,
    /// Operation plus one `name` value.
    Room,
    /// A single room description.
    Info,
    /// A list of room descriptions as parallel arrays.
    MultiInfo,
    /// A chat line: sender and text.
    User,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat protocol message.
///
/// The `name` of a [`Message::Room`] is a nickname, a room name, chat text
/// or a new room name depending on the opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Control {
        opcode: Opcode,
    },
    Room {
        opcode: Opcode,
        name: String,
    },
    Info {
        opcode: Opcode,
        name: String,
        /// Millis since the Unix epoch, `0` meaning never.
        time: u64,
        members: Vec<String>,
    },
    MultiInfo {
        opcode: Opcode,
        rooms: MultiInfo,
    },
    User {
        opcode: Opcode,
        name: String,
        text: String,
    },
}

impl Message {
    pub fn control(opcode: Opcode) -> Self {
        Self::Control { opcode }
    }

    pub fn room(opcode: Opcode, name: impl Into<String>) -> Self {
        Self::Room {
            opcode,
            name: name.into(),
        }
    }

    pub fn user(
        opcode: Opcode,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::User {
            opcode,
            name: name.into(),
            text: text.into(),
        }
    }

    /// `ReceiveText` from `sender`.
    pub fn receive_text(
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::user(Opcode::ReceiveText, sender, text)
    }

    /// `RoomInfoOk` describing one room.
    pub fn room_info_ok(desc: RoomDescription) -> Self {
        Self::Info {
            opcode: Opcode::RoomInfoOk,
            name: desc.name,
            time: desc.last_message,
            members: desc.members,
        }
    }

    /// `RoomListOk` describing every given room.
    pub fn room_list_ok(descs: Vec<RoomDescription>) -> Self {
        Self::MultiInfo {
            opcode: Opcode::RoomListOk,
            rooms: MultiInfo::from_descriptions(descs),
        }
    }

    /// Returns the message's opcode.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Control { opcode }
            | Self::Room { opcode, .. }
            | Self::Info { opcode, .. }
            | Self::MultiInfo { opcode, .. }
            | Self::User { opcode, .. } => *opcode,
        }
    }

    /// Returns the shape of this value, independent of its opcode.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Control { .. } => MessageKind::Control,
            Self::Room { .. } => MessageKind::Room,
            Self::Info { .. } => MessageKind::Info,
            Self::MultiInfo { .. } => MessageKind::MultiInfo,
            Self::User { .. } => MessageKind::User,
        }
    }
}

// ---------------------------------------------------------------------------
// MultiInfo
// ---------------------------------------------------------------------------

/// Parallel arrays of room names, last-message times, and member lists.
///
/// The three arrays always have the same length; [`MultiInfo::new`]
/// refuses anything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiInfo {
    names: Vec<String>,
    times: Vec<u64>,
    lists: Vec<Vec<String>>,
}

impl MultiInfo {
    /// Builds the arrays, rejecting mismatched lengths.
    pub fn new(
        names: Vec<String>,
        times: Vec<u64>,
        lists: Vec<Vec<String>>,
    ) -> Result<Self, ProtocolError> {
        if names.len() != times.len() || names.len() != lists.len() {
            return Err(ProtocolError::InvalidMessage(format!(
                "list sizes differ: {} names, {} times, {} member lists",
                names.len(),
                times.len(),
                lists.len()
            )));
        }
        Ok(Self {
            names,
            times,
            lists,
        })
    }

    pub fn from_descriptions(descs: Vec<RoomDescription>) -> Self {
        let mut info = Self::default();
        for desc in descs {
            info.names.push(desc.name);
            info.times.push(desc.last_message);
            info.lists.push(desc.members);
        }
        info
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn times(&self) -> &[u64] {
        &self.times
    }

    pub fn lists(&self) -> &[Vec<String>] {
        &self.lists
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Regroups the arrays into one description per room.
    pub fn into_descriptions(self) -> Vec<RoomDescription> {
        self.names
            .into_iter()
            .zip(self.times)
            .zip(self.lists)
            .map(|((name, last_message), members)| RoomDescription {
                name,
                members,
                last_message,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// RoomDescription
// ---------------------------------------------------------------------------

/// A read-only snapshot of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomDescription {
    pub name: String,
    /// Members in ascending nickname order.
    pub members: Vec<String>,
    /// Millis since the Unix epoch of the last broadcast, `0` if none.
    pub last_message: u64,
}

/// Current wall-clock time in millis since the Unix epoch, the unit of
/// [`RoomDescription::last_message`].
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Returns `true` if `name` can travel as a list item.
///
/// Nicknames and room names appear inside `,`/`;` separated lists, so
/// they must be non-empty and free of separators and line breaks.
pub fn is_wire_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains([',', ';', '\n', '\r'])
}

//! What the user sees: one notice per command outcome or inbound event.

use std::fmt;

use nanochat_protocol::RoomDescription;

use crate::HELP;

/// A user-visible outcome of a command or an asynchronous arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NickAccepted(String),
    NickDuplicated(String),
    RoomList {
        rooms: Vec<RoomDescription>,
        now: u64,
    },
    RoomInfo {
        room: RoomDescription,
        now: u64,
    },
    NoSuchRoom(String),
    Joined(String),
    JoinRefused(String),
    Created(String),
    CreateRefused(String),
    /// The user renamed their room.
    Renamed {
        from: String,
        to: String,
    },
    RenameRefused(String),
    Left(String),
    /// A chat line from another member.
    Chat {
        from: String,
        text: String,
    },
    UserJoined {
        nick: String,
        room: String,
    },
    UserLeft {
        nick: String,
        room: String,
    },
    /// Another member renamed the room.
    RoomRenamed(String),
    ConnectionLost(String),
    Help,
    Bye,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NickAccepted(nick) => write!(f, "* Your nickname is now {nick}."),
            Self::NickDuplicated(nick) => {
                write!(f, "* The nickname {nick} is already in use. Try another one.")
            }
            Self::RoomList { rooms, now } => {
                if rooms.is_empty() {
                    return write!(f, "* There are no rooms yet.");
                }
                write!(f, "* Rooms:")?;
                for room in rooms {
                    write!(
                        f,
                        "\n  {} [{}] last message {}",
                        room.name,
                        room.members.join(", "),
                        format_age(room.last_message, *now)
                    )?;
                }
                Ok(())
            }
            Self::RoomInfo { room, now } => write!(
                f,
                "Room: {}\n  Members ({}): {}\n  Last message: {}",
                room.name,
                room.members.len(),
                room.members.join(", "),
                format_age(room.last_message, *now)
            ),
            Self::NoSuchRoom(room) => write!(f, "* The room {room} does not exist."),
            Self::Joined(room) => write!(f, "* Joined chat room {room}."),
            Self::JoinRefused(room) => write!(f, "* Couldn't enter the room {room}."),
            Self::Created(room) => write!(f, "* Room {room} created."),
            Self::CreateRefused(room) => write!(f, "* Couldn't create the room {room}."),
            Self::Renamed { from, to } => {
                write!(f, "* You renamed the room from {from} to {to}.")
            }
            Self::RenameRefused(to) => write!(f, "* Unable to rename the room to {to}."),
            Self::Left(room) => write!(f, "* You left the room {room}."),
            Self::Chat { from, text } => write!(f, "{from}: {text}"),
            Self::UserJoined { nick, room } => write!(f, "User {nick} joined room {room}."),
            Self::UserLeft { nick, room } => write!(f, "User {nick} left room {room}."),
            Self::RoomRenamed(room) => {
                write!(f, "The room you are in was renamed to {room}.")
            }
            Self::ConnectionLost(reason) => {
                write!(f, "* Lost the connection to the chat server: {reason}")
            }
            Self::Help => f.write_str(HELP),
            Self::Bye => write!(f, "* Bye."),
        }
    }
}

/// Renders how long ago `then` was, both in millis since the epoch.
///
/// `0` means it never happened.
pub fn format_age(then: u64, now: u64) -> String {
    if then == 0 {
        return "not yet".to_string();
    }
    let secs = now.saturating_sub(then) / 1000;
    match secs {
        0..60 => format!("{secs}s ago"),
        60..3600 => format!("{}m {}s ago", secs / 60, secs % 60),
        _ => format!("{}h {}m ago", secs / 3600, secs % 3600 / 60),
    }
}

//! The client automaton's states and which commands each one accepts.

use std::fmt;

use crate::{Command, SessionError};

/// Where the client is in its conversation with the chat server.
///
/// ```text
///   Disconnected ──(connect)──→ PreRegister ──(ValidNick)──→ OffRoom
///                                                 ↑             │
///                                   (exit / failure)     (RoomEnterOk)
///                                                 │             ↓
///                                                 └────────── InRoom
///
///   any state ──(quit)──→ Quit
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No chat connection, or the server dropped it.
    Disconnected,
    /// Connected, no nickname yet.
    PreRegister,
    /// Registered, not in any room.
    OffRoom,
    /// Inside a room.
    InRoom,
    /// The user quit. Nothing else is accepted.
    Quit,
}

impl SessionState {
    /// Checks that `command` may run in this state.
    ///
    /// A rejected command never reaches the network.
    pub fn permits(self, command: &Command) -> Result<(), SessionError> {
        use Command as C;

        let reason = match (self, command) {
            (Self::Quit, _) => Some("the session has ended"),
            (_, C::Help | C::Quit) => None,
            (Self::Disconnected, _) => Some("not connected to a chat server"),

            (Self::PreRegister, C::Nick(_)) => None,
            (Self::PreRegister, _) => Some("you need to register a nickname first"),

            (Self::OffRoom, C::Nick(_)) => Some("you have already registered a nickname"),
            (Self::OffRoom, C::Info(None)) => {
                return Err(SessionError::Usage("info <room>"));
            }
            (Self::OffRoom, C::RoomList | C::Enter(_) | C::Create(_) | C::Info(_)) => None,
            (Self::OffRoom, C::Send(_) | C::Exit | C::Rename(_)) => {
                Some("only valid inside a room")
            }

            (Self::InRoom, C::Nick(_) | C::Enter(_) | C::Create(_)) => {
                Some("only valid outside a room")
            }
            (Self::InRoom, _) => None,
        };

        match reason {
            None => Ok(()),
            Some(reason) => Err(SessionError::NotAllowed {
                command: command.word(),
                reason,
            }),
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::PreRegister => "pre-register",
            Self::OffRoom => "off-room",
            Self::InRoom => "in-room",
            Self::Quit => "quit",
        };
        f.write_str(name)
    }
}

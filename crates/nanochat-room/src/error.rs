//! Error types for the room layer.
//!
//! These are expected, user-recoverable outcomes; the connection handler
//! turns each one into the protocol's negative reply.

/// Errors that can occur during registry and room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Another connection already registered this nickname.
    #[error("nickname {0:?} is already in use")]
    DuplicateNickname(String),

    /// No room has this name.
    #[error("room {0:?} does not exist")]
    NoSuchRoom(String),

    /// Another room already has this name.
    #[error("room name {0:?} is already in use")]
    NameInUse(String),

    /// The name can't be used as a nickname or room name.
    #[error("{0:?} is not a valid name")]
    InvalidName(String),

    /// The nickname is not registered.
    #[error("user {0:?} is not registered")]
    UnknownUser(String),

    /// The room's actor is gone.
    #[error("room is unavailable")]
    Unavailable,
}

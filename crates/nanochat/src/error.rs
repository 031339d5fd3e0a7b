//! Unified error type for nanoChat.

use nanochat_directory::DirectoryError;
use nanochat_protocol::ProtocolError;
use nanochat_room::RoomError;
use nanochat_session::SessionError;
use nanochat_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum NanoChatError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file could not be read or parsed.
    #[error("invalid config {path}: {reason}")]
    Config { path: String, reason: String },

    /// The directory has no chat server registered for the protocol.
    #[error("no chat server registered for protocol {0}")]
    NoServer(i32),
}

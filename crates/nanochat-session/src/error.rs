//! Error types for the client session.

use nanochat_protocol::{Opcode, ProtocolError};
use nanochat_transport::TransportError;

/// Errors that can occur while driving a client session.
///
/// The first group is rejected locally before anything is sent. The
/// rest are communication failures with the chat server.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The first word of the line is not a command.
    #[error("invalid command {0:?}, type help for the command list")]
    UnknownCommand(String),

    /// The command has the wrong number of arguments.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// The command is not valid in the current state.
    #[error("{command} is not allowed: {reason}")]
    NotAllowed {
        command: &'static str,
        reason: &'static str,
    },

    /// The message cannot be put on the wire. Nothing was sent.
    #[error("cannot send that: {0}")]
    Unsendable(#[source] ProtocolError),

    /// Could not open the chat connection.
    #[error("failed to connect to chat server {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: TransportError,
    },

    /// Sending, receiving or decoding failed.
    #[error("failed to talk to the chat server: {0}")]
    Communication(#[from] ProtocolError),

    /// The server closed the connection.
    #[error("the chat server closed the connection")]
    ConnectionClosed,

    /// The server answered with something the request does not allow.
    #[error("unexpected {0} from the chat server")]
    UnexpectedReply(Opcode),
}

impl SessionError {
    /// Returns `true` for failures that happened on the wire, as opposed
    /// to commands rejected locally.
    pub fn is_communication(&self) -> bool {
        matches!(
            self,
            Self::Communication(_) | Self::ConnectionClosed | Self::UnexpectedReply(_)
        )
    }
}

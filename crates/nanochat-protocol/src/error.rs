//! Error types for the protocol layer.
//!
//! Each crate in nanoChat defines its own error enum. A `ProtocolError`
//! means the problem is in turning messages into text or back, not in
//! room bookkeeping.

use nanochat_transport::TransportError;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The `operation` field named an operation we don't know.
    ///
    /// Fatal to the connection: the peer speaks a different protocol.
    #[error("unknown operation: {0:?}")]
    UnknownOperation(String),

    /// The text is not a well-formed message for its operation.
    ///
    /// Missing or misnamed fields, a non-numeric timestamp, mismatched
    /// list lengths, or stray lines after the terminator.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A message value cannot be put on the wire.
    ///
    /// Raised while encoding, e.g. a value containing a line break or a
    /// list item containing a separator.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The underlying connection failed while sending or receiving.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// Returns `true` if the message was refused before any byte of it
    /// was written, so the peer never saw it.
    pub fn is_unsendable(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage(_) | Self::Transport(TransportError::FrameTooLarge(_))
        )
    }
}

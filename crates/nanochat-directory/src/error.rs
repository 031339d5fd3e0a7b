//! Error types for the discovery directory.

use std::net::SocketAddr;

/// Errors that can occur while talking to, or running, the directory.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The UDP socket could not be bound.
    #[error("failed to bind directory socket on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The directory address could not be resolved.
    #[error("cannot resolve directory address {0}")]
    BadAddress(String),

    /// A datagram did not match any directory message layout.
    #[error("malformed directory datagram: {0}")]
    Malformed(String),

    /// Every attempt timed out without a matching answer.
    #[error("directory {addr} unreachable after {attempts} attempts")]
    DirectoryUnreachable { addr: SocketAddr, attempts: u32 },

    /// Sending or receiving a datagram failed.
    #[error("directory I/O error: {0}")]
    Io(#[from] std::io::Error),
}

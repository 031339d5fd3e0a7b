//! Discovery directory for nanoChat.
//!
//! Chat servers register the TCP port they serve a protocol on; clients
//! ask the directory who serves that protocol before connecting. The
//! exchange is a single UDP datagram each way, retried on timeout.
//!
//! - [`DirectoryMessage`]: the fixed binary datagram layouts
//! - [`DirectoryServer`]: the protocol → address table
//! - [`DirectoryClient`]: request/response with retransmission

use std::time::Duration;

mod client;
mod error;
mod message;
mod server;

pub use client::DirectoryClient;
pub use error::DirectoryError;
pub use message::DirectoryMessage;
pub use server::DirectoryServer;

/// Well-known UDP port of the directory.
pub const DEFAULT_PORT: u16 = 6868;

/// How long a client waits for each answer.
pub const TIMEOUT: Duration = Duration::from_millis(1000);

/// How many times a client sends a request before giving up.
pub const MAX_TIMEOUTS: u32 = 10;

/// Receive buffer size; every directory datagram fits.
pub const PACKET_MAX_SIZE: usize = 128;

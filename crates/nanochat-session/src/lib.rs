//! Client session for nanoChat.
//!
//! This crate is the client's automaton over its chat connection:
//!
//! 1. **Commands** ([`Command`]): parsing and argument checks for what the
//!    user types
//! 2. **States** ([`SessionState`]): which commands are valid where, so a
//!    misplaced command never touches the network
//! 3. **Session** ([`ClientSession`]): request/reply exchanges with the
//!    server, interleaved with chat lines and room notifications
//! 4. **Notices** ([`Notice`]): one user-visible line per outcome
//!
//! # How it fits in the stack
//!
//! ```text
//! Client driver (above)  ← reads the keyboard, prints notices
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← Message, send/recv over a TcpConnection
//! ```

mod client;
mod command;
mod error;
mod notice;
mod session;

pub use client::ClientSession;
pub use command::{Command, HELP};
pub use error::SessionError;
pub use notice::{Notice, format_age};
pub use session::SessionState;

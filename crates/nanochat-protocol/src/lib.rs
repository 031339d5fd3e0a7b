//! Wire protocol for nanoChat.
//!
//! This crate defines the "language" that chat clients and servers speak:
//!
//! - **Types** ([`Opcode`], [`Message`], [`MultiInfo`],
//!   [`RoomDescription`]): the message structures that travel on the wire.
//! - **Codec** ([`encode`], [`decode`]): field:value text in both
//!   directions.
//! - **Wire** ([`send_message`], [`recv_message`]): one message per
//!   transport frame.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (Message) → server handler / client session
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;
mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{decode, encode};
pub use error::ProtocolError;
pub use types::{
    Message, MessageKind, MultiInfo, Opcode, RoomDescription,
    is_wire_safe_name, now_millis,
};
pub use wire::{encode_frame, recv_message, send_message};

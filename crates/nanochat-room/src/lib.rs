//! Room management for nanoChat.
//!
//! Each room runs as an isolated Tokio task (actor model) holding its
//! members and their outbound channels; the [`RoomRegistry`] owns the
//! set of rooms and registered nicknames.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates and renames rooms, tracks users
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`AdmissionPolicy`]: decides who may enter a room
//! - [`MemberSender`]: a member's outbound message channel

mod error;
mod policy;
mod registry;
mod room;

pub use error::RoomError;
pub use policy::{AdmissionPolicy, OpenAdmission};
pub use registry::{Admission, RoomRegistry};
pub use room::{MemberSender, RoomHandle};

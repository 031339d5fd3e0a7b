//! Room admission: the hook deciding whether a nickname may enter a room.

/// Decides whether a user may enter a room.
///
/// Runs inside the room's actor, so it sees membership as of the moment
/// the request is processed.
pub trait AdmissionPolicy: Send + Sync + 'static {
    /// Returns `true` to admit `nick` into `room`.
    fn admits(&self, room: &str, nick: &str, already_member: bool) -> bool;
}

/// Admits everyone who is not already a member.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAdmission;

impl AdmissionPolicy for OpenAdmission {
    fn admits(&self, _room: &str, _nick: &str, already_member: bool) -> bool {
        !already_member
    }
}

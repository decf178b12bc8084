//! Domain layer: entities, value objects and collaborator interfaces.

pub mod attendance;
pub mod collaborator;
pub mod room;
pub mod value_object;

pub use attendance::{AttendanceRecord, AttendanceSession, FinalMark, SessionStatus};
pub use collaborator::{
    AttendanceSink, AuthError, EventPusher, Identity, IdentityProvider, NotificationTarget,
    PersistError, PushError, RosterError, RosterProvider,
};
pub use room::{ChatEntry, Member, Room, RoomError, RosterMember, MAX_CHAT_LOG};
pub use value_object::{
    AttendanceStatus, ClassId, ConnectionId, ContentError, InvalidStatus, MessageContent, Role,
    RoleSet, SessionId, Timestamp, UserId, MAX_MESSAGE_CHARS,
};

//! Collaborator traits the coordinator depends on.
//!
//! The domain layer defines the interfaces it needs; the infrastructure layer
//! provides the implementations (dependency inversion). The portal's CRUD
//! side owns users, rosters and attendance storage; from the coordinator's
//! perspective these are an identity lookup, a roster lookup and a
//! write-only persistence sink.

use async_trait::async_trait;
use thiserror::Error;

use super::attendance::AttendanceRecord;
use super::room::RosterMember;
use super::value_object::{ClassId, ConnectionId, RoleSet, UserId};

/// An authenticated caller: user id plus the role set resolved once at
/// authentication time and passed around as an opaque capability set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub name: String,
    pub roles: RoleSet,
}

/// Identity lookup failure. The channel is refused before registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no valid identity for this connection")]
    Unauthenticated,
}

/// Resolves the caller's identity from the handshake credentials.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Roster lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("roster lookup failed for class {0}: {1}")]
    Unavailable(ClassId, String),
}

/// Returns the enrolled users for a class. The snapshot may be stale between
/// refreshes; the coordinator re-fetches on room creation and session open.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RosterProvider: Send + Sync {
    async fn fetch(&self, class_id: ClassId) -> Result<Vec<RosterMember>, RosterError>;
}

/// Attendance persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistError {
    #[error("failed to persist attendance record: {0}")]
    WriteFailed(String),
}

/// Write-only sink for finalized attendance records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttendanceSink: Send + Sync {
    async fn save(&self, record: AttendanceRecord) -> Result<(), PersistError>;
}

/// Outbound push failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("channel '{0}' not found")]
    ChannelNotFound(ConnectionId),
    #[error("failed to push message: {0}")]
    PushFailed(String),
}

/// Pushes serialized events to live channels. All sends are fire-and-forget
/// from the caller's perspective; a broadcast tolerates per-recipient
/// failure and never blocks on a slow receiver.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPusher: Send + Sync {
    /// Push to a single channel.
    async fn push_to(&self, connection_id: ConnectionId, content: &str) -> Result<(), PushError>;

    /// Push to each target channel independently, skipping ones that fail.
    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str) -> Result<(), PushError>;
}

/// Audience descriptor for a notification dispatch. Resolved against the
/// currently live channels at the moment of dispatch; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTarget {
    User(UserId),
    Admins,
    Teachers,
}

impl NotificationTarget {
    /// Whether a channel with the given identity belongs to this audience.
    pub fn matches(&self, user_id: UserId, roles: &RoleSet) -> bool {
        use super::value_object::Role;

        match self {
            NotificationTarget::User(target) => user_id == *target,
            NotificationTarget::Admins => roles.contains(Role::Admin),
            NotificationTarget::Teachers => roles.contains(Role::Teacher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::RoleSet;

    #[test]
    fn test_notification_target_matches_user() {
        // テスト項目: User ターゲットは user_id の一致のみで判定される
        // given (前提条件):
        let target = NotificationTarget::User(UserId::new(5));
        let roles = RoleSet::normalize(["student"]);

        // when (操作):
        // then (期待する結果):
        assert!(target.matches(UserId::new(5), &roles));
        assert!(!target.matches(UserId::new(6), &roles));
    }

    #[test]
    fn test_notification_target_matches_roles() {
        // テスト項目: Admins/Teachers ターゲットはロールで判定される
        // given (前提条件):
        let admin_roles = RoleSet::normalize(["admin"]);
        let teacher_roles = RoleSet::normalize(["teacher"]);

        // when (操作):
        // then (期待する結果):
        assert!(NotificationTarget::Admins.matches(UserId::new(1), &admin_roles));
        assert!(!NotificationTarget::Admins.matches(UserId::new(1), &teacher_roles));
        assert!(NotificationTarget::Teachers.matches(UserId::new(2), &teacher_roles));
        assert!(!NotificationTarget::Teachers.matches(UserId::new(2), &admin_roles));
    }
}

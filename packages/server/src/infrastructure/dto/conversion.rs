//! Conversions between domain types and wire DTOs.

use crate::domain::{Member, NotificationTarget, RoomError, UserId};
use crate::infrastructure::dto::http::PublishNotificationRequestDto;
use crate::infrastructure::dto::websocket::{OutboundEvent, UserDto};

impl From<&Member> for UserDto {
    fn from(member: &Member) -> Self {
        Self {
            id: member.user_id,
            name: member.name.clone(),
            roles: member.roles.names(),
        }
    }
}

/// Stable machine-readable code for each rejection, paired with the human
/// explanation from the error's `Display`.
pub fn room_error_code(err: &RoomError) -> &'static str {
    match err {
        RoomError::Forbidden => "forbidden",
        RoomError::NotEnrolledOrUnauthorized(_) => "not_enrolled_or_unauthorized",
        RoomError::NotEnrolled(_) => "not_enrolled",
        RoomError::NoOpenSession => "no_open_session",
        RoomError::SessionAlreadyOpen => "session_already_open",
        RoomError::InvalidMessage(_) => "invalid_message",
        RoomError::InvalidStatus(_) => "invalid_status",
    }
}

impl From<&RoomError> for OutboundEvent {
    fn from(err: &RoomError) -> Self {
        OutboundEvent::Error {
            reason: room_error_code(err).to_string(),
            detail: err.to_string(),
        }
    }
}

/// Audience parse failure for the notification inlet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudienceError {
    #[error("unknown audience '{0}', expected admin, teacher or user")]
    UnknownAudience(String),
    #[error("audience 'user' requires a user_id")]
    MissingUserId,
}

impl TryFrom<&PublishNotificationRequestDto> for NotificationTarget {
    type Error = AudienceError;

    fn try_from(request: &PublishNotificationRequestDto) -> Result<Self, Self::Error> {
        match request.audience.as_str() {
            "admin" => Ok(NotificationTarget::Admins),
            "teacher" => Ok(NotificationTarget::Teachers),
            "user" => request
                .user_id
                .map(|id| NotificationTarget::User(UserId::new(id)))
                .ok_or(AudienceError::MissingUserId),
            other => Err(AudienceError::UnknownAudience(other.to_string())),
        }
    }
}

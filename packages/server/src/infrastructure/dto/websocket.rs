//! WebSocket message DTOs.
//!
//! Inbound messages are the commands a client may send over a classroom
//! channel; outbound events are everything the coordinator pushes. Both
//! sides carry a `type` discriminator field so clients can route on it.

use serde::{Deserialize, Serialize};

use crate::domain::{ClassId, SessionId, UserId};

/// Client-to-server messages on a classroom channel.
///
/// Unknown fields inside a known message type are ignored so that clients
/// may attach their own metadata, but an unknown `type` is an
/// `invalid_message` rejection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Re-acknowledge membership. Joining happens at the handshake, so this
    /// is answered with a fresh `online_users` snapshot.
    Join,
    /// Orderly departure. The server confirms by closing the channel.
    Leave,
    ChatMessage {
        message: String,
    },
    AttendanceSessionStarted,
    AttendanceSessionEnded,
    SelfAttendanceMarked {
        student_id: i64,
        status: String,
    },
    AttendanceMarked {
        student_id: i64,
        status: String,
    },
    OnlineUsers,
    Ping,
}

/// One user as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDto {
    pub id: UserId,
    pub name: String,
    pub roles: Vec<&'static str>,
}

/// Server-to-client events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    #[serde(rename = "presence:joined")]
    PresenceJoined { user: UserDto, timestamp: i64 },
    #[serde(rename = "presence:left")]
    PresenceLeft { user: UserDto, timestamp: i64 },
    #[serde(rename = "chat:message")]
    ChatMessage {
        user: UserDto,
        message: String,
        timestamp: i64,
    },
    #[serde(rename = "attendance:opened")]
    AttendanceOpened {
        class_id: ClassId,
        session_id: SessionId,
        opened_by: UserId,
        timestamp: i64,
    },
    #[serde(rename = "attendance:closed")]
    AttendanceClosed {
        class_id: ClassId,
        session_id: SessionId,
        timestamp: i64,
    },
    #[serde(rename = "attendance:self_marked")]
    AttendanceSelfMarked {
        student_id: UserId,
        student_name: String,
        status: &'static str,
        timestamp: i64,
    },
    #[serde(rename = "attendance:marked")]
    AttendanceMarked {
        student_id: UserId,
        status: &'static str,
        marked_by: UserId,
        timestamp: i64,
    },
    #[serde(rename = "online_users")]
    OnlineUsers { users: Vec<UserDto> },
    #[serde(rename = "error")]
    Error { reason: String, detail: String },
    #[serde(rename = "pong")]
    Pong { timestamp: i64 },
}

impl OutboundEvent {
    /// Serialize for the wire. These DTOs contain nothing that can fail to
    /// serialize.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            tracing::error!("Failed to serialize outbound event: {}", err);
            r#"{"type":"error","reason":"internal","detail":"serialization failure"}"#.to_string()
        })
    }
}

/// Envelope pushed on notification channels. The payload is opaque to the
/// coordinator and forwarded as-is.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEventDto<'a> {
    pub r#type: &'a str,
    pub payload: &'a serde_json::Value,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_message_parses_known_types() {
        // テスト項目: 既知の type を持つメッセージが対応する variant になる
        // given (前提条件):
        let chat = r#"{"type":"chat_message","message":"hi"}"#;
        let mark = r#"{"type":"self_attendance_marked","student_id":3,"status":"present"}"#;
        let ping = r#"{"type":"ping","timestamp":123}"#;

        // when (操作):
        let chat: InboundMessage = serde_json::from_str(chat).unwrap();
        let mark: InboundMessage = serde_json::from_str(mark).unwrap();
        let ping: InboundMessage = serde_json::from_str(ping).unwrap();

        // then (期待する結果):
        assert_eq!(
            chat,
            InboundMessage::ChatMessage {
                message: "hi".to_string()
            }
        );
        assert_eq!(
            mark,
            InboundMessage::SelfAttendanceMarked {
                student_id: 3,
                status: "present".to_string()
            }
        );
        // extra fields on a unit variant are ignored
        assert_eq!(ping, InboundMessage::Ping);
    }

    #[test]
    fn test_inbound_message_rejects_unknown_type() {
        // テスト項目: 未知の type はパースエラーになる
        // given (前提条件):
        let raw = r#"{"type":"take_over_the_class"}"#;

        // when (操作):
        let result = serde_json::from_str::<InboundMessage>(raw);

        // then (期待する結果):
        assert!(result.is_err());
    }

    #[test]
    fn test_outbound_event_carries_type_tag() {
        // テスト項目: 送信イベントの JSON に type タグが含まれる
        // given (前提条件):
        let event = OutboundEvent::Pong { timestamp: 42 };

        // when (操作):
        let json: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();

        // then (期待する結果):
        assert_eq!(json["type"], "pong");
        assert_eq!(json["timestamp"], 42);
    }
}

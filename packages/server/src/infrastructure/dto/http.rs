//! HTTP surface DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::{ClassId, SessionId};

/// One live room in the `GET /api/rooms` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSummaryDto {
    pub class_id: ClassId,
    pub member_count: usize,
    pub open_session_id: Option<SessionId>,
    pub created_at: String,
}

/// Request body for `POST /api/notifications`, the inlet the portal's CRUD
/// side calls to reach live channels.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishNotificationRequestDto {
    /// "admin", "teacher" or "user".
    pub audience: String,
    /// Required when audience is "user".
    pub user_id: Option<i64>,
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishNotificationResponseDto {
    /// Number of live channels the event was handed to.
    pub delivered: usize,
}

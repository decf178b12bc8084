//! Use case: broadcast a chat message to a room.

use std::sync::Arc;

use terakoya_shared::time::Clock;

use crate::domain::{ConnectionId, EventPusher, MessageContent, Timestamp};
use crate::infrastructure::dto::websocket::{OutboundEvent, UserDto};
use crate::infrastructure::registry::ConnectionRegistry;
use crate::infrastructure::room_hub::RoomHub;
use crate::usecase::error::SendChatMessageError;

/// Validates a chat message, appends it to the room's bounded log and
/// broadcasts it to every member, sender included. Validation and broadcast
/// happen under the room lock, so two racing messages reach all members in
/// the same relative order.
pub struct SendChatMessageUseCase {
    rooms: Arc<RoomHub>,
    registry: Arc<ConnectionRegistry>,
    event_pusher: Arc<dyn EventPusher>,
    clock: Arc<dyn Clock>,
}

impl SendChatMessageUseCase {
    pub fn new(
        rooms: Arc<RoomHub>,
        registry: Arc<ConnectionRegistry>,
        event_pusher: Arc<dyn EventPusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rooms,
            registry,
            event_pusher,
            clock,
        }
    }

    pub async fn execute(
        &self,
        connection_id: ConnectionId,
        text: String,
    ) -> Result<(), SendChatMessageError> {
        let info = self
            .registry
            .channel_info(connection_id)
            .await
            .ok_or(SendChatMessageError::NotInRoom)?;
        let class_id = info.joined_class.ok_or(SendChatMessageError::NotInRoom)?;
        let room = self
            .rooms
            .get(class_id)
            .await
            .ok_or(SendChatMessageError::NotInRoom)?;

        let content =
            MessageContent::new(text).map_err(crate::domain::RoomError::InvalidMessage)?;

        let mut room = room.lock().await;
        let sender = room
            .member(connection_id)
            .cloned()
            .ok_or(SendChatMessageError::NotInRoom)?;
        let entry = room.append_chat(&sender, content, Timestamp::new(self.clock.now_millis()));

        let event = OutboundEvent::ChatMessage {
            user: UserDto::from(&sender),
            message: entry.text.into_string(),
            timestamp: entry.timestamp.value(),
        };
        let _ = self
            .event_pusher
            .broadcast(room.member_ids(), &event.to_json())
            .await;
        Ok(())
    }
}

//! Use case: remove a channel from its room.
//!
//! Runs for both the explicit `leave` message and transport disconnects, so
//! it is idempotent from end to end. When the last member leaves a room with
//! no open attendance session, the room is destroyed.

use std::sync::Arc;

use terakoya_shared::time::Clock;

use crate::domain::{ClassId, ConnectionId, EventPusher};
use crate::infrastructure::dto::websocket::{OutboundEvent, UserDto};
use crate::infrastructure::registry::ConnectionRegistry;
use crate::infrastructure::room_hub::RoomHub;

pub struct LeaveClassroomUseCase {
    rooms: Arc<RoomHub>,
    registry: Arc<ConnectionRegistry>,
    event_pusher: Arc<dyn EventPusher>,
    clock: Arc<dyn Clock>,
}

impl LeaveClassroomUseCase {
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

    /// Remove the channel from whichever room it joined. Returns the class
    /// left, or `None` when the channel was not in any room (a no-op).
    pub async fn execute(&self, connection_id: ConnectionId) -> Option<ClassId> {
        let info = self.registry.channel_info(connection_id).await?;
        let class_id = info.joined_class?;
        let room = self.rooms.get(class_id).await?;

        {
            let mut room = room.lock().await;
            if let Some(member) = room.leave(connection_id) {
                tracing::info!(
                    "User {} left the room for class {} (members: {})",
                    member.user_id,
                    class_id,
                    room.member_count()
                );
                let left = OutboundEvent::PresenceLeft {
                    user: UserDto::from(&member),
                    timestamp: self.clock.now_millis(),
                };
                let _ = self
                    .event_pusher
                    .broadcast(room.member_ids(), &left.to_json())
                    .await;
            }
        }

        self.registry.set_joined_class(connection_id, None).await;
        self.rooms.remove_if_destroyable(class_id).await;
        Some(class_id)
    }
}

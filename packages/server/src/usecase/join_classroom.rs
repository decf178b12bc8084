//! Use case: admit an authenticated channel into a class room.

use std::sync::Arc;

use terakoya_shared::time::Clock;

use crate::domain::{
    ClassId, ConnectionId, EventPusher, Identity, Member, RosterProvider, Timestamp,
};
use crate::infrastructure::dto::websocket::{OutboundEvent, UserDto};
use crate::infrastructure::registry::ConnectionRegistry;
use crate::infrastructure::room_hub::RoomHub;
use crate::usecase::error::JoinClassroomError;

/// Admits a channel into the room for a class, creating the room on first
/// join. On success every member, including the joiner, receives
/// `presence:joined`, and the joiner gets an `online_users` snapshot. Both
/// are emitted under the room lock, so they sit at a single point in the
/// room's event order.
pub struct JoinClassroomUseCase {
    rooms: Arc<RoomHub>,
    registry: Arc<ConnectionRegistry>,
    roster_provider: Arc<dyn RosterProvider>,
    event_pusher: Arc<dyn EventPusher>,
    clock: Arc<dyn Clock>,
}

impl JoinClassroomUseCase {
    pub fn new(
        rooms: Arc<RoomHub>,
        registry: Arc<ConnectionRegistry>,
        roster_provider: Arc<dyn RosterProvider>,
        event_pusher: Arc<dyn EventPusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rooms,
            registry,
            roster_provider,
            event_pusher,
            clock,
        }
    }

    pub async fn execute(
        &self,
        class_id: ClassId,
        connection_id: ConnectionId,
        identity: &Identity,
    ) -> Result<(), JoinClassroomError> {
        let room = match self.rooms.get(class_id).await {
            Some(room) => room,
            None => {
                // Roster is fetched before creating the room so that the
                // enrollment gate applies from the very first join.
                let roster = self.roster_provider.fetch(class_id).await?;
                self.rooms
                    .get_or_create(class_id, roster, Timestamp::new(self.clock.now_millis()))
                    .await
            }
        };

        let member = Member {
            user_id: identity.user_id,
            name: identity.name.clone(),
            roles: identity.roles.clone(),
        };

        {
            let mut room = room.lock().await;
            if let Err(err) = room.join(connection_id, member.clone()) {
                drop(room);
                // a room created just for this rejected join is empty and
                // gets torn down again
                self.rooms.remove_if_destroyable(class_id).await;
                return Err(err.into());
            }
            self.registry
                .set_joined_class(connection_id, Some(class_id))
                .await;

            tracing::info!(
                "User {} joined the room for class {} (members: {})",
                identity.user_id,
                class_id,
                room.member_count()
            );

            let joined = OutboundEvent::PresenceJoined {
                user: UserDto::from(&member),
                timestamp: self.clock.now_millis(),
            };
            let _ = self
                .event_pusher
                .broadcast(room.member_ids(), &joined.to_json())
                .await;
            self.push_online_users(&room, connection_id).await;
        }
        Ok(())
    }

    /// Answer an in-room `join` or `online_users` request with a fresh
    /// snapshot. Joining is idempotent per channel, so a repeated `join`
    /// only re-acknowledges.
    pub async fn snapshot(&self, class_id: ClassId, connection_id: ConnectionId) {
        if let Some(room) = self.rooms.get(class_id).await {
            let room = room.lock().await;
            if room.contains_member(connection_id) {
                self.push_online_users(&room, connection_id).await;
            }
        }
    }

    async fn push_online_users(&self, room: &crate::domain::Room, connection_id: ConnectionId) {
        let snapshot = OutboundEvent::OnlineUsers {
            users: room.online_users().iter().map(UserDto::from).collect(),
        };
        if let Err(err) = self
            .event_pusher
            .push_to(connection_id, &snapshot.to_json())
            .await
        {
            tracing::warn!(
                "Failed to push online_users to channel '{}': {}",
                connection_id,
                err
            );
        }
    }
}

//! Use case: read-side snapshot of live rooms.

use std::sync::Arc;

use terakoya_shared::time::timestamp_to_rfc3339;

use crate::infrastructure::dto::http::RoomSummaryDto;
use crate::infrastructure::room_hub::RoomHub;

pub struct GetRoomsUseCase {
    rooms: Arc<RoomHub>,
}

impl GetRoomsUseCase {
    pub fn new(rooms: Arc<RoomHub>) -> Self {
        Self { rooms }
    }

    pub async fn execute(&self) -> Vec<RoomSummaryDto> {
        self.rooms
            .overview()
            .await
            .into_iter()
            .map(|overview| RoomSummaryDto {
                class_id: overview.class_id,
                member_count: overview.member_count,
                open_session_id: overview.open_session_id,
                created_at: timestamp_to_rfc3339(overview.created_at.value()),
            })
            .collect()
    }
}

//! In-memory arena of rooms, one per class.
//!
//! Rooms are created on first join and destroyed once empty with no open
//! session. Each room lives behind its own `Mutex`; holding that lock across
//! a mutation and the resulting broadcast is what serializes a room's event
//! stream. The hub's own lock only guards the map and is never held while a
//! room lock is awaited by someone else in the opposite order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{ClassId, Room, RosterMember, SessionId, Timestamp};

/// Point-in-time view of one room, for the read-side HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOverview {
    pub class_id: ClassId,
    pub member_count: usize,
    pub open_session_id: Option<SessionId>,
    pub created_at: Timestamp,
}

/// Owner of all live rooms.
#[derive(Default)]
pub struct RoomHub {
    rooms: Mutex<HashMap<ClassId, Arc<Mutex<Room>>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, class_id: ClassId) -> Option<Arc<Mutex<Room>>> {
        let rooms = self.rooms.lock().await;
        rooms.get(&class_id).cloned()
    }

    /// Get the room for a class, creating it with the given roster snapshot
    /// if absent. When two joins race, one creates and the other reuses; the
    /// loser's roster snapshot is discarded.
    pub async fn get_or_create(
        &self,
        class_id: ClassId,
        roster: Vec<RosterMember>,
        created_at: Timestamp,
    ) -> Arc<Mutex<Room>> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(class_id)
            .or_insert_with(|| {
                tracing::info!("Room for class {} created", class_id);
                Arc::new(Mutex::new(Room::new(class_id, created_at, roster)))
            })
            .clone()
    }

    /// Drop the room if it has no members and no open session. Returns true
    /// when the room was removed.
    pub async fn remove_if_destroyable(&self, class_id: ClassId) -> bool {
        let mut rooms = self.rooms.lock().await;
        let destroyable = match rooms.get(&class_id) {
            Some(room) => room.lock().await.can_be_destroyed(),
            None => false,
        };
        if destroyable {
            rooms.remove(&class_id);
            tracing::info!("Room for class {} destroyed", class_id);
        }
        destroyable
    }

    pub async fn contains(&self, class_id: ClassId) -> bool {
        let rooms = self.rooms.lock().await;
        rooms.contains_key(&class_id)
    }

    /// Snapshot of all live rooms, sorted by class id.
    pub async fn overview(&self) -> Vec<RoomOverview> {
        let handles: Vec<(ClassId, Arc<Mutex<Room>>)> = {
            let rooms = self.rooms.lock().await;
            rooms
                .iter()
                .map(|(class_id, room)| (*class_id, room.clone()))
                .collect()
        };
        let mut overviews = Vec::with_capacity(handles.len());
        for (class_id, handle) in handles {
            let room = handle.lock().await;
            overviews.push(RoomOverview {
                class_id,
                member_count: room.member_count(),
                open_session_id: room
                    .session()
                    .filter(|session| session.is_open())
                    .map(|session| session.id()),
                created_at: room.created_at(),
            });
        }
        overviews.sort_by_key(|overview| overview.class_id);
        overviews
    }
}

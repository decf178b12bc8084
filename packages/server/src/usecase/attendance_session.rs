//! Use case: the attendance session lifecycle.
//!
//! Opening, closing and marking all run under the room lock together with
//! their broadcasts, so attendance events interleave deterministically with
//! presence and chat on every member's channel.

use std::sync::Arc;

use terakoya_shared::time::Clock;

use crate::domain::{
    AttendanceSink, AttendanceStatus, ClassId, EventPusher, Identity, RoomError, RosterProvider,
    SessionId, Timestamp, UserId,
};
use crate::infrastructure::dto::websocket::OutboundEvent;
use crate::infrastructure::room_hub::RoomHub;
use crate::usecase::error::AttendanceError;

pub struct AttendanceSessionUseCase {
    rooms: Arc<RoomHub>,
    roster_provider: Arc<dyn RosterProvider>,
    attendance_sink: Arc<dyn AttendanceSink>,
    event_pusher: Arc<dyn EventPusher>,
    clock: Arc<dyn Clock>,
}

impl AttendanceSessionUseCase {
    pub fn new(
        rooms: Arc<RoomHub>,
        roster_provider: Arc<dyn RosterProvider>,
        attendance_sink: Arc<dyn AttendanceSink>,
        event_pusher: Arc<dyn EventPusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rooms,
            roster_provider,
            attendance_sink,
            event_pusher,
            clock,
        }
    }

    /// Open a session for a class. The roster is re-fetched first so the
    /// mark map reflects current enrollment. Broadcasts `attendance:opened`
    /// to every member.
    pub async fn open(
        &self,
        class_id: ClassId,
        caller: &Identity,
    ) -> Result<SessionId, AttendanceError> {
        let room = self
            .rooms
            .get(class_id)
            .await
            .ok_or(AttendanceError::RoomNotFound(class_id))?;
        let roster = self.roster_provider.fetch(class_id).await?;

        let mut room = room.lock().await;
        let session = room.open_session(
            caller.user_id,
            &caller.roles,
            Timestamp::new(self.clock.now_millis()),
            roster,
        )?;
        let session_id = session.id();
        let opened_at = session.opened_at();
        tracing::info!(
            "Attendance session '{}' opened for class {} by user {}",
            session_id,
            class_id,
            caller.user_id
        );

        let event = OutboundEvent::AttendanceOpened {
            class_id,
            session_id,
            opened_by: caller.user_id,
            timestamp: opened_at.value(),
        };
        let _ = self
            .event_pusher
            .broadcast(room.member_ids(), &event.to_json())
            .await;
        Ok(session_id)
    }

    /// Close the open session. Unmarked roster members are finalized as
    /// absent, the record goes to the persistence sink, and every member
    /// receives `attendance:closed`. A persistence failure is reported to
    /// the caller but does not reopen the session.
    pub async fn close(&self, class_id: ClassId, caller: &Identity) -> Result<(), AttendanceError> {
        let room = self
            .rooms
            .get(class_id)
            .await
            .ok_or(AttendanceError::RoomNotFound(class_id))?;

        // The guard is released before the persistence call: the session is
        // already CLOSED and announced, and chat or presence on the room must
        // not stall behind an external write.
        let record = {
            let mut room = room.lock().await;
            let record =
                room.close_session(&caller.roles, Timestamp::new(self.clock.now_millis()))?;
            tracing::info!(
                "Attendance session '{}' closed for class {} ({} marks)",
                record.session_id,
                class_id,
                record.marks.len()
            );

            let event = OutboundEvent::AttendanceClosed {
                class_id,
                session_id: record.session_id,
                timestamp: record.date.value(),
            };
            let _ = self
                .event_pusher
                .broadcast(room.member_ids(), &event.to_json())
                .await;
            record
        };

        self.attendance_sink.save(record).await?;
        Ok(())
    }

    /// Student self-check-in. The caller may only mark themselves; the
    /// confirmation goes to the student and to staff members of the room,
    /// not to other students.
    pub async fn mark_self(
        &self,
        class_id: ClassId,
        caller: &Identity,
        student_id: UserId,
        status: AttendanceStatus,
    ) -> Result<(), AttendanceError> {
        if caller.user_id != student_id {
            return Err(RoomError::Forbidden.into());
        }
        let room = self
            .rooms
            .get(class_id)
            .await
            .ok_or(AttendanceError::RoomNotFound(class_id))?;

        let mut room = room.lock().await;
        room.mark_self(student_id, status)?;

        let event = OutboundEvent::AttendanceSelfMarked {
            student_id,
            student_name: caller.name.clone(),
            status: status.as_str(),
            timestamp: self.clock.now_millis(),
        };
        let mut targets = room.staff_member_ids();
        let caller_channels = room
            .member_ids()
            .into_iter()
            .filter(|connection_id| {
                room.member(*connection_id)
                    .map(|member| member.user_id == caller.user_id)
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>();
        for connection_id in caller_channels {
            if !targets.contains(&connection_id) {
                targets.push(connection_id);
            }
        }
        let _ = self
            .event_pusher
            .broadcast(targets, &event.to_json())
            .await;
        Ok(())
    }

    /// Teacher or admin marks any roster member with any status. The update
    /// is broadcast to the whole room.
    pub async fn mark_other(
        &self,
        class_id: ClassId,
        caller: &Identity,
        student_id: UserId,
        status: AttendanceStatus,
    ) -> Result<(), AttendanceError> {
        let room = self
            .rooms
            .get(class_id)
            .await
            .ok_or(AttendanceError::RoomNotFound(class_id))?;

        let mut room = room.lock().await;
        room.mark_other(&caller.roles, student_id, status)?;

        let event = OutboundEvent::AttendanceMarked {
            student_id,
            status: status.as_str(),
            marked_by: caller.user_id,
            timestamp: self.clock.now_millis(),
        };
        let _ = self
            .event_pusher
            .broadcast(room.member_ids(), &event.to_json())
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collaborator::{MockAttendanceSink, MockEventPusher, MockRosterProvider};
    use crate::domain::{RoleSet, RosterError};
    use terakoya_shared::time::FixedClock;

    fn teacher() -> Identity {
        Identity {
            user_id: UserId::new(2),
            name: "teacher".to_string(),
            roles: RoleSet::normalize(["teacher"]),
        }
    }

    #[tokio::test]
    async fn test_open_fails_when_roster_lookup_fails() {
        // テスト項目: 名簿取得に失敗した場合、セッションは開始されず何も配信されない
        // given (前提条件):
        let rooms = Arc::new(RoomHub::new());
        let class_id = ClassId::new(1);
        rooms
            .get_or_create(class_id, Vec::new(), Timestamp::new(0))
            .await;

        let mut roster_provider = MockRosterProvider::new();
        roster_provider.expect_fetch().returning(|class_id| {
            Err(RosterError::Unavailable(
                class_id,
                "portal unavailable".to_string(),
            ))
        });
        let mut event_pusher = MockEventPusher::new();
        event_pusher.expect_broadcast().never();

        let usecase = AttendanceSessionUseCase::new(
            rooms.clone(),
            Arc::new(roster_provider),
            Arc::new(MockAttendanceSink::new()),
            Arc::new(event_pusher),
            Arc::new(FixedClock::new(0)),
        );

        // when (操作):
        let result = usecase.open(class_id, &teacher()).await;

        // then (期待する結果):
        assert!(matches!(result, Err(AttendanceError::Roster(_))));
        let room = rooms.get(class_id).await.unwrap();
        assert!(!room.lock().await.has_open_session());
    }

    #[tokio::test]
    async fn test_open_without_live_room_fails() {
        // テスト項目: ルームが存在しないクラスではセッションを開始できない
        // given (前提条件):
        let rooms = Arc::new(RoomHub::new());
        let mut roster_provider = MockRosterProvider::new();
        roster_provider.expect_fetch().never();

        let usecase = AttendanceSessionUseCase::new(
            rooms,
            Arc::new(roster_provider),
            Arc::new(MockAttendanceSink::new()),
            Arc::new(MockEventPusher::new()),
            Arc::new(FixedClock::new(0)),
        );

        // when (操作):
        let result = usecase.open(ClassId::new(9), &teacher()).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(AttendanceError::RoomNotFound(ClassId::new(9)))
        );
    }
}

//! Attendance session state machine.
//!
//! A session moves `OPEN -> CLOSED` and `CLOSED` is terminal: opening again
//! creates a fresh session object, it never resurrects an old one. While a
//! session is open, marks follow last-write-wins with no conflict
//! resolution.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use super::value_object::{AttendanceStatus, ClassId, SessionId, Timestamp, UserId};

/// Lifecycle state of an attendance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

/// Rejected mark mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkError {
    #[error("attendance session is closed")]
    SessionClosed,
    #[error("user {0} is not in the roster snapshot")]
    NotInRoster(UserId),
}

/// One finalized mark inside an [`AttendanceRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalMark {
    pub student_id: UserId,
    pub status: AttendanceStatus,
}

/// The immutable record handed to the persistence collaborator when a
/// session closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub class_id: ClassId,
    pub session_id: SessionId,
    pub date: Timestamp,
    pub marks: Vec<FinalMark>,
}

/// A teacher-controlled attendance period for one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceSession {
    id: SessionId,
    class_id: ClassId,
    opened_by: UserId,
    opened_at: Timestamp,
    status: SessionStatus,
    /// Per-roster-member mark. Seeded to `Unmarked` on open; only roster
    /// members ever appear as keys.
    marks: HashMap<UserId, AttendanceStatus>,
}

impl AttendanceSession {
    /// Open a new session, seeding every roster member to `Unmarked`
    /// (absent-by-default until changed).
    pub fn open(
        class_id: ClassId,
        opened_by: UserId,
        opened_at: Timestamp,
        roster_ids: impl IntoIterator<Item = UserId>,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            class_id,
            opened_by,
            opened_at,
            status: SessionStatus::Open,
            marks: roster_ids
                .into_iter()
                .map(|user_id| (user_id, AttendanceStatus::Unmarked))
                .collect(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn opened_by(&self) -> UserId {
        self.opened_by
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    pub fn status_of(&self, user_id: UserId) -> Option<AttendanceStatus> {
        self.marks.get(&user_id).copied()
    }

    /// Set a mark. Last write wins; caller-side role rules (who may set which
    /// status) are enforced by the room, not here.
    pub fn mark(&mut self, user_id: UserId, status: AttendanceStatus) -> Result<(), MarkError> {
        if !self.is_open() {
            return Err(MarkError::SessionClosed);
        }
        match self.marks.get_mut(&user_id) {
            Some(slot) => {
                *slot = status;
                Ok(())
            }
            None => Err(MarkError::NotInRoster(user_id)),
        }
    }

    /// Close the session and produce the permanent record. Any mark still
    /// `Unmarked` is recorded as `Absent`. Closing an already closed session
    /// is a caller bug guarded by the room.
    pub fn close(&mut self, closed_at: Timestamp) -> AttendanceRecord {
        self.status = SessionStatus::Closed;
        let mut marks: Vec<FinalMark> = self
            .marks
            .iter_mut()
            .map(|(user_id, status)| {
                if *status == AttendanceStatus::Unmarked {
                    *status = AttendanceStatus::Absent;
                }
                FinalMark {
                    student_id: *user_id,
                    status: *status,
                }
            })
            .collect();
        // Deterministic order for persistence and tests
        marks.sort_by_key(|mark| mark.student_id);

        AttendanceRecord {
            class_id: self.class_id,
            session_id: self.id,
            date: closed_at,
            marks,
        }
    }
}

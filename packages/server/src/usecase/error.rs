//! Use-case error types.
//!
//! Each use case exposes its own error enum so handlers can match the exact
//! failures a flow produces. Domain rejections pass through transparently
//! and keep their wire codes.

use thiserror::Error;

use crate::domain::{ClassId, PersistError, RoomError, RosterError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinClassroomError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Roster(#[from] RosterError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendChatMessageError {
    #[error("this channel has not joined a room")]
    NotInRoom,
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttendanceError {
    #[error("no live room exists for class {0}")]
    RoomNotFound(ClassId),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

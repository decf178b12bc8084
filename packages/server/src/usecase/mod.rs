//! Use-case layer: one struct per application flow, wired with the shared
//! state and collaborator implementations at startup.

pub mod attendance_session;
pub mod error;
pub mod get_rooms;
pub mod join_classroom;
pub mod leave_classroom;
pub mod publish_notification;
pub mod send_chat_message;

pub use attendance_session::AttendanceSessionUseCase;
pub use error::{AttendanceError, JoinClassroomError, SendChatMessageError};
pub use get_rooms::GetRoomsUseCase;
pub use join_classroom::JoinClassroomUseCase;
pub use leave_classroom::LeaveClassroomUseCase;
pub use publish_notification::PublishNotificationUseCase;
pub use send_chat_message::SendChatMessageUseCase;

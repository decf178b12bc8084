//! Shared application state for the Axum handlers.

use std::sync::Arc;

use terakoya_shared::time::Clock;

use crate::domain::IdentityProvider;
use crate::infrastructure::registry::ConnectionRegistry;
use crate::usecase::{
    AttendanceSessionUseCase, GetRoomsUseCase, JoinClassroomUseCase, LeaveClassroomUseCase,
    PublishNotificationUseCase, SendChatMessageUseCase,
};

/// Everything a request handler needs, injected once at startup.
pub struct AppState {
    pub identity_provider: Arc<dyn IdentityProvider>,
    pub registry: Arc<ConnectionRegistry>,
    pub clock: Arc<dyn Clock>,
    pub join_classroom_usecase: Arc<JoinClassroomUseCase>,
    pub leave_classroom_usecase: Arc<LeaveClassroomUseCase>,
    pub send_chat_message_usecase: Arc<SendChatMessageUseCase>,
    pub attendance_session_usecase: Arc<AttendanceSessionUseCase>,
    pub publish_notification_usecase: Arc<PublishNotificationUseCase>,
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
}

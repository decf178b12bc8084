//! WebSocket handler for classroom channels.
//!
//! Authentication, registration and the room join all happen before the
//! protocol upgrade, so a caller that is unauthenticated, not enrolled or
//! reusing a connection id is refused with an HTTP status and no channel is
//! ever created.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    domain::{AttendanceStatus, ClassId, ConnectionId, Identity, RoomError, UserId},
    infrastructure::dto::websocket::{InboundMessage, OutboundEvent},
    ui::state::AppState,
    usecase::{AttendanceError, JoinClassroomError, SendChatMessageError},
};

/// Query parameters for the WebSocket handshake.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub token: String,
}

pub async fn classroom_websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(class_id): Path<i64>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let identity = match state.identity_provider.authenticate(&query.token).await {
        Ok(identity) => identity,
        Err(_) => {
            tracing::warn!("Rejected unauthenticated channel for class {}", class_id);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let class_id = ClassId::new(class_id);
    let connection_id = ConnectionId::generate();

    // Create the channel this client will receive events on
    let (tx, rx) = mpsc::unbounded_channel();

    if let Err(err) = state.registry.register(connection_id, &identity, tx).await {
        tracing::warn!("Rejecting connection for class {}: {}", class_id, err);
        return Err(StatusCode::CONFLICT);
    }

    match state
        .join_classroom_usecase
        .execute(class_id, connection_id, &identity)
        .await
    {
        Ok(()) => {
            tracing::info!(
                "User {} connected to the room for class {}",
                identity.user_id,
                class_id
            );
            // The channel is already registered and a room member. Should the
            // upgrade itself fail, the socket task never runs, so the failure
            // callback has to undo both.
            let failed_state = state.clone();
            Ok(ws
                .on_failed_upgrade(move |err| {
                    tracing::warn!(
                        "Upgrade failed for channel '{}' on class {}: {}",
                        connection_id,
                        class_id,
                        err
                    );
                    tokio::spawn(async move {
                        cleanup_channel(&failed_state, connection_id).await;
                    });
                })
                .on_upgrade(move |socket| {
                    handle_classroom_socket(socket, state, class_id, connection_id, identity, rx)
                }))
        }
        Err(err) => {
            // The channel never became a member; undo the registration.
            state.registry.deregister(connection_id).await;
            match err {
                JoinClassroomError::Room(RoomError::NotEnrolledOrUnauthorized(user_id)) => {
                    tracing::warn!(
                        "User {} is not enrolled in class {} and not staff",
                        user_id,
                        class_id
                    );
                    Err(StatusCode::FORBIDDEN)
                }
                JoinClassroomError::Roster(err) => {
                    tracing::error!("Roster lookup failed: {}", err);
                    Err(StatusCode::SERVICE_UNAVAILABLE)
                }
                err => {
                    tracing::error!("Failed to admit channel: {}", err);
                    Err(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
    }
}

/// Drains the client's mpsc channel into the WebSocket sink.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_classroom_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    class_id: ClassId,
    connection_id: ConnectionId,
    identity: Identity,
    rx: mpsc::UnboundedReceiver<String>,
) {
    let (sender, mut receiver) = socket.split();

    let state_clone = state.clone();
    let identity_clone = identity.clone();

    // Task reading messages from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on channel '{}': {}", connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let inbound = match serde_json::from_str::<InboundMessage>(&text) {
                        Ok(inbound) => inbound,
                        Err(e) => {
                            tracing::debug!(
                                "Unparseable message on channel '{}': {}",
                                connection_id,
                                e
                            );
                            let event = OutboundEvent::Error {
                                reason: "invalid_message".to_string(),
                                detail: format!("unrecognized message: {e}"),
                            };
                            push_to_self(&state_clone, connection_id, &event).await;
                            continue;
                        }
                    };
                    let closing = dispatch(
                        &state_clone,
                        class_id,
                        connection_id,
                        &identity_clone,
                        inbound,
                    )
                    .await;
                    if closing {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Channel '{}' requested close", connection_id);
                    break;
                }
                // Ping/pong frames are handled by the protocol layer
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    // Cleanup runs before the handler returns: the departure broadcast and
    // the registry removal are not deferred to a background task.
    cleanup_channel(&state, connection_id).await;
    tracing::info!(
        "Channel '{}' (user {}) disconnected and deregistered",
        connection_id,
        identity.user_id
    );
}

/// Leave whatever room the channel joined and remove it from the registry.
/// Safe for channels that never joined a room; the leave is a no-op then.
pub(crate) async fn cleanup_channel(state: &Arc<AppState>, connection_id: ConnectionId) {
    state.leave_classroom_usecase.execute(connection_id).await;
    state.registry.deregister(connection_id).await;
}

/// Route one inbound message. Returns true when the channel should close.
async fn dispatch(
    state: &Arc<AppState>,
    class_id: ClassId,
    connection_id: ConnectionId,
    identity: &Identity,
    inbound: InboundMessage,
) -> bool {
    match inbound {
        // Joining happened at the handshake; answer with a fresh snapshot.
        InboundMessage::Join | InboundMessage::OnlineUsers => {
            state
                .join_classroom_usecase
                .snapshot(class_id, connection_id)
                .await;
        }
        InboundMessage::Leave => {
            tracing::info!("Channel '{}' leaving the room", connection_id);
            return true;
        }
        InboundMessage::ChatMessage { message } => {
            if let Err(err) = state
                .send_chat_message_usecase
                .execute(connection_id, message)
                .await
            {
                let event = match &err {
                    SendChatMessageError::Room(room_err) => OutboundEvent::from(room_err),
                    SendChatMessageError::NotInRoom => OutboundEvent::Error {
                        reason: "invalid_message".to_string(),
                        detail: err.to_string(),
                    },
                };
                push_to_self(state, connection_id, &event).await;
            }
        }
        InboundMessage::AttendanceSessionStarted => {
            if let Err(err) = state
                .attendance_session_usecase
                .open(class_id, identity)
                .await
            {
                push_attendance_error(state, connection_id, &err).await;
            }
        }
        InboundMessage::AttendanceSessionEnded => {
            if let Err(err) = state
                .attendance_session_usecase
                .close(class_id, identity)
                .await
            {
                push_attendance_error(state, connection_id, &err).await;
            }
        }
        InboundMessage::SelfAttendanceMarked { student_id, status } => {
            let result = match AttendanceStatus::parse(&status) {
                Ok(status) => {
                    state
                        .attendance_session_usecase
                        .mark_self(class_id, identity, UserId::new(student_id), status)
                        .await
                }
                Err(invalid) => Err(RoomError::InvalidStatus(invalid).into()),
            };
            if let Err(err) = result {
                push_attendance_error(state, connection_id, &err).await;
            }
        }
        InboundMessage::AttendanceMarked { student_id, status } => {
            let result = match AttendanceStatus::parse(&status) {
                Ok(status) => {
                    state
                        .attendance_session_usecase
                        .mark_other(class_id, identity, UserId::new(student_id), status)
                        .await
                }
                Err(invalid) => Err(RoomError::InvalidStatus(invalid).into()),
            };
            if let Err(err) = result {
                push_attendance_error(state, connection_id, &err).await;
            }
        }
        InboundMessage::Ping => {
            let event = OutboundEvent::Pong {
                timestamp: state.clock.now_millis(),
            };
            push_to_self(state, connection_id, &event).await;
        }
    }
    false
}

/// Deliver an event to the offending channel only, through its own sender so
/// it lands in order with anything already queued.
async fn push_to_self(state: &Arc<AppState>, connection_id: ConnectionId, event: &OutboundEvent) {
    if let Some(sender) = state.registry.sender(connection_id).await {
        if sender.send(event.to_json()).is_err() {
            tracing::debug!("Channel '{}' gone before error delivery", connection_id);
        }
    }
}

async fn push_attendance_error(
    state: &Arc<AppState>,
    connection_id: ConnectionId,
    err: &AttendanceError,
) {
    let event = match err {
        AttendanceError::Room(room_err) => OutboundEvent::from(room_err),
        err => OutboundEvent::Error {
            reason: "internal".to_string(),
            detail: err.to_string(),
        },
    };
    push_to_self(state, connection_id, &event).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::RoleSet;
    use crate::infrastructure::{
        collaborator::{InMemoryAttendanceSink, InMemoryIdentityProvider, InMemoryRosterProvider},
        pusher::WebSocketEventPusher,
        registry::ConnectionRegistry,
        room_hub::RoomHub,
    };
    use crate::usecase::{
        AttendanceSessionUseCase, GetRoomsUseCase, JoinClassroomUseCase, LeaveClassroomUseCase,
        PublishNotificationUseCase, SendChatMessageUseCase,
    };
    use terakoya_shared::time::FixedClock;

    const NOW_MILLIS: i64 = 1_700_000_000_000;

    fn app_state() -> (Arc<AppState>, Arc<RoomHub>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let rooms = Arc::new(RoomHub::new());
        let roster_provider = Arc::new(InMemoryRosterProvider::new());
        let attendance_sink = Arc::new(InMemoryAttendanceSink::new());
        let event_pusher = Arc::new(WebSocketEventPusher::new(registry.clone()));
        let clock = Arc::new(FixedClock::new(NOW_MILLIS));

        let state = Arc::new(AppState {
            identity_provider: Arc::new(InMemoryIdentityProvider::new()),
            registry: registry.clone(),
            clock: clock.clone(),
            join_classroom_usecase: Arc::new(JoinClassroomUseCase::new(
                rooms.clone(),
                registry.clone(),
                roster_provider.clone(),
                event_pusher.clone(),
                clock.clone(),
            )),
            leave_classroom_usecase: Arc::new(LeaveClassroomUseCase::new(
                rooms.clone(),
                registry.clone(),
                event_pusher.clone(),
                clock.clone(),
            )),
            send_chat_message_usecase: Arc::new(SendChatMessageUseCase::new(
                rooms.clone(),
                registry.clone(),
                event_pusher.clone(),
                clock.clone(),
            )),
            attendance_session_usecase: Arc::new(AttendanceSessionUseCase::new(
                rooms.clone(),
                roster_provider,
                attendance_sink,
                event_pusher.clone(),
                clock.clone(),
            )),
            publish_notification_usecase: Arc::new(PublishNotificationUseCase::new(
                registry.clone(),
                event_pusher,
                clock,
            )),
            get_rooms_usecase: Arc::new(GetRoomsUseCase::new(rooms.clone())),
        });
        (state, rooms)
    }

    fn teacher_identity() -> Identity {
        Identity {
            user_id: UserId::new(2),
            name: "teacher".to_string(),
            roles: RoleSet::normalize(["teacher"]),
        }
    }

    async fn register(
        state: &Arc<AppState>,
        identity: &Identity,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let connection_id = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        state
            .registry
            .register(connection_id, identity, tx)
            .await
            .unwrap();
        (connection_id, rx)
    }

    #[tokio::test]
    async fn test_cleanup_channel_reverts_registration_and_membership() {
        // テスト項目: ハンドシェイク後にソケットが開かなかったチャネルを完全に巻き戻す
        // given (前提条件): 登録済みかつ入室済みだがソケットを持たないチャネル
        let (state, rooms) = app_state();
        let class_id = ClassId::new(1);
        let identity = teacher_identity();
        let (connection_id, _rx) = register(&state, &identity).await;
        state
            .join_classroom_usecase
            .execute(class_id, connection_id, &identity)
            .await
            .unwrap();
        assert_eq!(state.registry.count().await, 1);
        assert!(rooms.contains(class_id).await);

        // when (操作): アップグレード失敗時と同じ後始末を実行する
        cleanup_channel(&state, connection_id).await;

        // then (期待する結果): レジストリも部屋も残らない
        assert_eq!(state.registry.count().await, 0);
        assert!(!rooms.contains(class_id).await);
    }

    #[tokio::test]
    async fn test_cleanup_channel_without_room_membership() {
        // テスト項目: 入室していないチャネルの後始末は登録解除のみ行う
        // given (前提条件): 登録のみ済ませたチャネル
        let (state, _rooms) = app_state();
        let identity = teacher_identity();
        let (connection_id, _rx) = register(&state, &identity).await;

        // when (操作):
        cleanup_channel(&state, connection_id).await;

        // then (期待する結果): レジストリから消えている
        assert_eq!(state.registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_ping_answers_with_injected_clock() {
        // テスト項目: pong のタイムスタンプが注入した時計から取られる
        // given (前提条件): 固定時計で構成した状態と登録済みチャネル
        let (state, _rooms) = app_state();
        let identity = teacher_identity();
        let (connection_id, mut rx) = register(&state, &identity).await;

        // when (操作): ping を処理する
        let closing = dispatch(
            &state,
            ClassId::new(1),
            connection_id,
            &identity,
            InboundMessage::Ping,
        )
        .await;

        // then (期待する結果): 固定時計の時刻を載せた pong が届く
        assert!(!closing);
        let raw = rx.try_recv().expect("expected a pong");
        let event: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(event["type"], "pong");
        assert_eq!(event["timestamp"], NOW_MILLIS);
    }
}

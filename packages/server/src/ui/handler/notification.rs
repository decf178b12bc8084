//! WebSocket handlers for notification channels.
//!
//! Notification channels are receive-mostly: the server pushes events and
//! the client may only send `ping`. Role and identity gates are enforced at
//! the handshake, mirroring the classroom channel.

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
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, Identity, Role, UserId},
    infrastructure::dto::websocket::{InboundMessage, OutboundEvent},
    ui::handler::websocket::{cleanup_channel, ConnectQuery},
    ui::state::AppState,
};

/// `/ws/admin/notifications`: requires the admin role.
pub async fn admin_notifications_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let identity = authenticate(&state, &query).await?;
    if !identity.roles.contains(Role::Admin) {
        tracing::warn!(
            "User {} lacks the admin role for the admin notification channel",
            identity.user_id
        );
        return Err(StatusCode::FORBIDDEN);
    }
    open_notification_channel(ws, state, identity).await
}

/// `/ws/teacher/notifications`: requires the teacher role.
pub async fn teacher_notifications_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let identity = authenticate(&state, &query).await?;
    if !identity.roles.contains(Role::Teacher) {
        tracing::warn!(
            "User {} lacks the teacher role for the teacher notification channel",
            identity.user_id
        );
        return Err(StatusCode::FORBIDDEN);
    }
    open_notification_channel(ws, state, identity).await
}

/// `/ws/user/{user_id}/notifications`: only for the user themselves.
pub async fn user_notifications_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let identity = authenticate(&state, &query).await?;
    if identity.user_id != UserId::new(user_id) {
        tracing::warn!(
            "User {} attempted to open the notification channel of user {}",
            identity.user_id,
            user_id
        );
        return Err(StatusCode::FORBIDDEN);
    }
    open_notification_channel(ws, state, identity).await
}

async fn authenticate(state: &Arc<AppState>, query: &ConnectQuery) -> Result<Identity, StatusCode> {
    state
        .identity_provider
        .authenticate(&query.token)
        .await
        .map_err(|_| {
            tracing::warn!("Rejected unauthenticated notification channel");
            StatusCode::UNAUTHORIZED
        })
}

async fn open_notification_channel(
    ws: WebSocketUpgrade,
    state: Arc<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, StatusCode> {
    let connection_id = ConnectionId::generate();
    let (tx, rx) = mpsc::unbounded_channel();

    if let Err(err) = state.registry.register(connection_id, &identity, tx).await {
        tracing::warn!("Rejecting notification channel: {}", err);
        return Err(StatusCode::CONFLICT);
    }
    tracing::info!(
        "User {} opened a notification channel '{}'",
        identity.user_id,
        connection_id
    );

    // Registered but not yet upgraded; a failed upgrade must still free the
    // registry slot.
    let failed_state = state.clone();
    Ok(ws
        .on_failed_upgrade(move |err| {
            tracing::warn!(
                "Upgrade failed for notification channel '{}': {}",
                connection_id,
                err
            );
            tokio::spawn(async move {
                cleanup_channel(&failed_state, connection_id).await;
            });
        })
        .on_upgrade(move |socket| handle_notification_socket(socket, state, connection_id, rx)))
}

async fn handle_notification_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    connection_id: ConnectionId,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let state_clone = state.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    // Only ping is meaningful on this channel; everything
                    // else is ignored.
                    if let Ok(InboundMessage::Ping) = serde_json::from_str::<InboundMessage>(&text)
                    {
                        let pong = OutboundEvent::Pong {
                            timestamp: state_clone.clock.now_millis(),
                        };
                        if let Some(tx) = state_clone.registry.sender(connection_id).await {
                            let _ = tx.send(pong.to_json());
                        }
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.registry.deregister(connection_id).await;
    tracing::info!("Notification channel '{}' closed", connection_id);
}

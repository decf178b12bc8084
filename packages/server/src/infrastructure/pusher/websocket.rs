//! WebSocket implementation of the `EventPusher` interface.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ConnectionId, EventPusher, PushError};
use crate::infrastructure::registry::ConnectionRegistry;

/// Pushes serialized events into the per-channel mpsc senders held by the
/// connection registry. The socket task on the other end drains the channel
/// into the actual WebSocket.
pub struct WebSocketEventPusher {
    registry: Arc<ConnectionRegistry>,
}

impl WebSocketEventPusher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl EventPusher for WebSocketEventPusher {
    async fn push_to(&self, connection_id: ConnectionId, content: &str) -> Result<(), PushError> {
        let sender = self
            .registry
            .sender(connection_id)
            .await
            .ok_or(PushError::ChannelNotFound(connection_id))?;
        sender
            .send(content.to_string())
            .map_err(|err| PushError::PushFailed(err.to_string()))
    }

    /// Best-effort fan-out. A channel that disconnected between target
    /// resolution and delivery is logged and skipped, never an error for the
    /// remaining recipients.
    async fn broadcast(&self, targets: Vec<ConnectionId>, content: &str) -> Result<(), PushError> {
        for connection_id in targets {
            if let Err(err) = self.push_to(connection_id, content).await {
                tracing::warn!("Failed to push to channel '{}': {}", connection_id, err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identity;
    use crate::domain::{RoleSet, UserId};
    use tokio::sync::mpsc;

    fn identity(user_id: i64) -> Identity {
        Identity {
            user_id: UserId::new(user_id),
            name: format!("user-{user_id}"),
            roles: RoleSet::normalize(["student"]),
        }
    }

    #[tokio::test]
    async fn test_push_to_delivers_to_registered_channel() {
        // テスト項目: 登録済みチャンネルにメッセージが届く
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let pusher = WebSocketEventPusher::new(registry.clone());
        let connection_id = ConnectionId::generate();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .register(connection_id, &identity(1), tx)
            .await
            .unwrap();

        // when (操作):
        pusher.push_to(connection_id, "hello").await.unwrap();

        // then (期待する結果):
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_push_to_unknown_channel_fails() {
        // テスト項目: 未登録チャンネルへの push はエラーになる
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let pusher = WebSocketEventPusher::new(registry);
        let connection_id = ConnectionId::generate();

        // when (操作):
        let result = pusher.push_to(connection_id, "hello").await;

        // then (期待する結果):
        assert_eq!(result, Err(PushError::ChannelNotFound(connection_id)));
    }

    #[tokio::test]
    async fn test_broadcast_tolerates_missing_channels() {
        // テスト項目: 一部のチャンネルが消えていても残りには配送される
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new());
        let pusher = WebSocketEventPusher::new(registry.clone());
        let alive = ConnectionId::generate();
        let gone = ConnectionId::generate();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(alive, &identity(1), tx).await.unwrap();

        // when (操作):
        let result = pusher.broadcast(vec![gone, alive], "event").await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(rx.recv().await.unwrap(), "event");
    }
}

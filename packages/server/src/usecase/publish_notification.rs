//! Use case: dispatch a notification to an audience of live channels.

use std::sync::Arc;

use terakoya_shared::time::Clock;

use crate::domain::{EventPusher, NotificationTarget};
use crate::infrastructure::dto::websocket::NotificationEventDto;
use crate::infrastructure::registry::ConnectionRegistry;

/// Resolves the audience against the currently connected channels and pushes
/// the event once per matching channel. Dispatch is fire-and-forget: there
/// is no queueing for offline users, and a channel that disappears between
/// resolution and delivery is simply skipped.
pub struct PublishNotificationUseCase {
    registry: Arc<ConnectionRegistry>,
    event_pusher: Arc<dyn EventPusher>,
    clock: Arc<dyn Clock>,
}

impl PublishNotificationUseCase {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        event_pusher: Arc<dyn EventPusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            event_pusher,
            clock,
        }
    }

    /// Returns the number of channels the event was handed to.
    pub async fn execute(
        &self,
        target: NotificationTarget,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> usize {
        let targets = self.registry.find_target(&target).await;
        let delivered = targets.len();
        if delivered == 0 {
            tracing::debug!("No live channels for notification target {:?}", target);
            return 0;
        }

        let event = NotificationEventDto {
            r#type: event_type,
            payload,
            timestamp: self.clock.now_millis(),
        };
        let content = serde_json::to_string(&event).unwrap_or_else(|err| {
            tracing::error!("Failed to serialize notification event: {}", err);
            String::new()
        });
        if content.is_empty() {
            return 0;
        }

        tracing::info!(
            "Dispatching '{}' notification to {} channel(s)",
            event_type,
            delivered
        );
        let _ = self.event_pusher.broadcast(targets, &content).await;
        delivered
    }
}

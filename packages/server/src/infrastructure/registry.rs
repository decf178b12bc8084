//! Connection registry: every live channel, keyed by connection id.
//!
//! The registry is the only state shared between rooms and the notification
//! dispatcher, so all access goes through one async mutex. Senders are
//! unbounded mpsc channels; pushing never blocks the caller on a slow
//! receiver.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::domain::{ClassId, ConnectionId, Identity, NotificationTarget, RoleSet, UserId};

/// Outbound channel to one connected client.
pub type ChannelSender = mpsc::UnboundedSender<String>;

/// Registration failure. Duplicate ids are a transport anomaly and are
/// rejected rather than silently overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("connection '{0}' is already registered")]
    DuplicateConnection(ConnectionId),
}

/// Identity metadata of a registered channel, without its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub user_id: UserId,
    pub name: String,
    pub roles: RoleSet,
    pub joined_class: Option<ClassId>,
}

struct ChannelHandle {
    info: ChannelInfo,
    sender: ChannelSender,
}

/// Registry of live channels.
#[derive(Default)]
pub struct ConnectionRegistry {
    channels: Mutex<HashMap<ConnectionId, ChannelHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a channel. Fails with [`RegistryError::DuplicateConnection`] if
    /// the connection id is already registered.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        identity: &Identity,
        sender: ChannelSender,
    ) -> Result<(), RegistryError> {
        let mut channels = self.channels.lock().await;
        if channels.contains_key(&connection_id) {
            return Err(RegistryError::DuplicateConnection(connection_id));
        }
        channels.insert(
            connection_id,
            ChannelHandle {
                info: ChannelInfo {
                    user_id: identity.user_id,
                    name: identity.name.clone(),
                    roles: identity.roles.clone(),
                    joined_class: None,
                },
                sender,
            },
        );
        tracing::debug!("Channel '{}' registered", connection_id);
        Ok(())
    }

    /// Remove a channel. Idempotent: deregistering an unknown id is a no-op.
    pub async fn deregister(&self, connection_id: ConnectionId) -> Option<ChannelInfo> {
        let mut channels = self.channels.lock().await;
        let removed = channels.remove(&connection_id).map(|handle| handle.info);
        if removed.is_some() {
            tracing::debug!("Channel '{}' deregistered", connection_id);
        }
        removed
    }

    /// Record which room a channel has joined. A channel belongs to at most
    /// one room; the previous value is returned for the caller to assert on.
    pub async fn set_joined_class(
        &self,
        connection_id: ConnectionId,
        class_id: Option<ClassId>,
    ) -> Option<ClassId> {
        let mut channels = self.channels.lock().await;
        match channels.get_mut(&connection_id) {
            Some(handle) => {
                let previous = handle.info.joined_class;
                handle.info.joined_class = class_id;
                previous
            }
            None => None,
        }
    }

    pub async fn channel_info(&self, connection_id: ConnectionId) -> Option<ChannelInfo> {
        let channels = self.channels.lock().await;
        channels.get(&connection_id).map(|handle| handle.info.clone())
    }

    /// Clone the sender for one channel.
    pub async fn sender(&self, connection_id: ConnectionId) -> Option<ChannelSender> {
        let channels = self.channels.lock().await;
        channels.get(&connection_id).map(|handle| handle.sender.clone())
    }

    /// Live channels matching a predicate over user id and roles. Reflects
    /// only currently-connected channels; used by the dispatcher.
    pub async fn find<F>(&self, predicate: F) -> Vec<ConnectionId>
    where
        F: Fn(UserId, &RoleSet) -> bool,
    {
        let channels = self.channels.lock().await;
        channels
            .iter()
            .filter(|(_, handle)| predicate(handle.info.user_id, &handle.info.roles))
            .map(|(connection_id, _)| *connection_id)
            .collect()
    }

    /// Live channels belonging to a notification audience at this moment.
    pub async fn find_target(&self, target: &NotificationTarget) -> Vec<ConnectionId> {
        self.find(|user_id, roles| target.matches(user_id, roles))
            .await
    }

    pub async fn count(&self) -> usize {
        let channels = self.channels.lock().await;
        channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Identity;

    fn identity(user_id: i64, roles: &[&str]) -> Identity {
        Identity {
            user_id: UserId::new(user_id),
            name: format!("user-{user_id}"),
            roles: RoleSet::normalize(roles.iter().copied()),
        }
    }

    fn channel() -> (ChannelSender, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn test_register_and_deregister() {
        // テスト項目: チャンネルの登録と削除ができる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let connection_id = ConnectionId::generate();
        let (tx, _rx) = channel();

        // when (操作):
        let result = registry
            .register(connection_id, &identity(1, &["student"]), tx)
            .await;

        // then (期待する結果):
        assert!(result.is_ok());
        assert_eq!(registry.count().await, 1);

        let removed = registry.deregister(connection_id).await;
        assert_eq!(removed.unwrap().user_id, UserId::new(1));
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_register_duplicate_connection_fails() {
        // テスト項目: 同一 connection id の二重登録が拒否される（上書きしない）
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let connection_id = ConnectionId::generate();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();
        registry
            .register(connection_id, &identity(1, &["student"]), tx1)
            .await
            .unwrap();

        // when (操作):
        let result = registry
            .register(connection_id, &identity(2, &["student"]), tx2)
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(RegistryError::DuplicateConnection(connection_id))
        );
        let info = registry.channel_info(connection_id).await.unwrap();
        assert_eq!(info.user_id, UserId::new(1));
    }

    #[tokio::test]
    async fn test_deregister_unknown_id_is_noop() {
        // テスト項目: 未知の id の削除は no-op（冪等）
        // given (前提条件):
        let registry = ConnectionRegistry::new();

        // when (操作):
        let removed = registry.deregister(ConnectionId::generate()).await;

        // then (期待する結果):
        assert!(removed.is_none());
    }

    #[tokio::test]
    async fn test_find_target_matches_roles_and_user() {
        // テスト項目: 現在接続中のチャンネルだけがターゲット解決に現れる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let admin1 = ConnectionId::generate();
        let admin2 = ConnectionId::generate();
        let teacher = ConnectionId::generate();
        let student = ConnectionId::generate();
        for (connection_id, id) in [
            (admin1, identity(1, &["admin"])),
            (admin2, identity(2, &["admin"])),
            (teacher, identity(3, &["teacher"])),
            (student, identity(4, &["student"])),
        ] {
            let (tx, _rx) = channel();
            // rx is dropped here; find does not care about liveness of the
            // receiving side, only about registration
            registry.register(connection_id, &id, tx).await.unwrap();
        }

        // when (操作):
        let admins = registry.find_target(&NotificationTarget::Admins).await;
        let teachers = registry.find_target(&NotificationTarget::Teachers).await;
        let user4 = registry
            .find_target(&NotificationTarget::User(UserId::new(4)))
            .await;

        // then (期待する結果):
        assert_eq!(admins.len(), 2);
        assert!(admins.contains(&admin1) && admins.contains(&admin2));
        assert_eq!(teachers, vec![teacher]);
        assert_eq!(user4, vec![student]);
    }

    #[tokio::test]
    async fn test_set_joined_class_tracks_single_room() {
        // テスト項目: チャンネルの所属ルームを記録・解除できる
        // given (前提条件):
        let registry = ConnectionRegistry::new();
        let connection_id = ConnectionId::generate();
        let (tx, _rx) = channel();
        registry
            .register(connection_id, &identity(1, &["student"]), tx)
            .await
            .unwrap();

        // when (操作):
        let previous = registry
            .set_joined_class(connection_id, Some(ClassId::new(7)))
            .await;

        // then (期待する結果):
        assert!(previous.is_none());
        let info = registry.channel_info(connection_id).await.unwrap();
        assert_eq!(info.joined_class, Some(ClassId::new(7)));

        let previous = registry.set_joined_class(connection_id, None).await;
        assert_eq!(previous, Some(ClassId::new(7)));
    }
}

//! In-memory collaborators.
//!
//! The coordinator treats identity, rosters and attendance storage as
//! external services behind the domain traits. These implementations back
//! them with in-process maps, which is what the standalone binary and the
//! integration tests run against. A deployment wired to the portal database
//! would swap these out without touching the use cases.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    AttendanceRecord, AttendanceSink, AuthError, ClassId, Identity, IdentityProvider,
    PersistError, RosterError, RosterMember, RosterProvider,
};

/// Token-to-identity map. Unknown tokens are unauthenticated.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Identity>>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, token: impl Into<String>, identity: Identity) {
        let mut accounts = self.accounts.lock().await;
        accounts.insert(token.into(), identity);
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let accounts = self.accounts.lock().await;
        accounts.get(token).cloned().ok_or(AuthError::Unauthenticated)
    }
}

/// Class-to-roster map. A class with no entry has an empty roster, which
/// admits staff only.
#[derive(Default)]
pub struct InMemoryRosterProvider {
    rosters: Mutex<HashMap<ClassId, Vec<RosterMember>>>,
}

impl InMemoryRosterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_roster(&self, class_id: ClassId, roster: Vec<RosterMember>) {
        let mut rosters = self.rosters.lock().await;
        rosters.insert(class_id, roster);
    }
}

#[async_trait]
impl RosterProvider for InMemoryRosterProvider {
    async fn fetch(&self, class_id: ClassId) -> Result<Vec<RosterMember>, RosterError> {
        let rosters = self.rosters.lock().await;
        Ok(rosters.get(&class_id).cloned().unwrap_or_default())
    }
}

/// Append-only record store. Tests read the stored records back to assert on
/// finalized sessions.
#[derive(Default)]
pub struct InMemoryAttendanceSink {
    records: Mutex<Vec<AttendanceRecord>>,
}

impl InMemoryAttendanceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AttendanceRecord> {
        let records = self.records.lock().await;
        records.clone()
    }
}

#[async_trait]
impl AttendanceSink for InMemoryAttendanceSink {
    async fn save(&self, record: AttendanceRecord) -> Result<(), PersistError> {
        tracing::info!(
            "Attendance record for class {} session '{}' persisted ({} marks)",
            record.class_id,
            record.session_id,
            record.marks.len()
        );
        let mut records = self.records.lock().await;
        records.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RoleSet, UserId};

    #[tokio::test]
    async fn test_authenticate_known_and_unknown_token() {
        // テスト項目: 登録済みトークンは Identity を返し、未知のトークンは拒否される
        // given (前提条件):
        let provider = InMemoryIdentityProvider::new();
        provider
            .insert(
                "token-alice",
                Identity {
                    user_id: UserId::new(1),
                    name: "alice".to_string(),
                    roles: RoleSet::normalize(["student"]),
                },
            )
            .await;

        // when (操作):
        let known = provider.authenticate("token-alice").await;
        let unknown = provider.authenticate("token-nobody").await;

        // then (期待する結果):
        assert_eq!(known.unwrap().user_id, UserId::new(1));
        assert_eq!(unknown, Err(AuthError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_fetch_unknown_class_returns_empty_roster() {
        // テスト項目: 未登録クラスの名簿は空として扱われる
        // given (前提条件):
        let provider = InMemoryRosterProvider::new();

        // when (操作):
        let roster = provider.fetch(ClassId::new(99)).await;

        // then (期待する結果):
        assert_eq!(roster.unwrap(), Vec::new());
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::{
    repo::{CredentialStore, StoreError, StoreResult},
    repo_types::{NewUser, SessionRecord, SessionSlot, UserProfile, UserRecord},
};

/// Mutex-guarded map with the same semantics as the Postgres store.
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
    tenants: Vec<i32>,
}

impl InMemoryCredentialStore {
    pub fn new(tenants: Vec<i32>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            tenants,
        }
    }

    pub async fn len(&self) -> usize {
        self.users.lock().await.len()
    }

    /// Raw row access for assertions.
    pub async fn get(&self, id: Uuid) -> Option<UserRecord> {
        self.users.lock().await.get(&id).cloned()
    }

    pub async fn set_active(&self, id: Uuid, active: bool) {
        if let Some(u) = self.users.lock().await.get_mut(&id) {
            u.is_active = active;
        }
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new(vec![1])
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_session(&self, id: Uuid) -> StoreResult<Option<SessionRecord>> {
        let users = self.users.lock().await;
        Ok(users.get(&id).map(|u| SessionRecord {
            id: u.id,
            email: u.email.clone(),
            tenant_id: u.tenant_id,
            role: u.role,
            refresh_token_hash: u.refresh_token_hash.clone(),
            refresh_token_id: u.refresh_token_id,
        }))
    }

    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<UserProfile>> {
        let users = self.users.lock().await;
        Ok(users.get(&id).map(|u| UserProfile {
            id: u.id,
            email: u.email.clone(),
            tenant_id: u.tenant_id,
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
        }))
    }

    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        if !self.tenants.contains(&user.tenant_id) {
            return Err(StoreError::UnknownTenant(user.tenant_id));
        }
        let mut users = self.users.lock().await;
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let record = UserRecord {
            id: user.id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            tenant_id: user.tenant_id,
            role: user.role,
            is_active: true,
            refresh_token_hash: Some(user.session.token_hash),
            refresh_token_id: Some(user.session.token_id),
            created_at: now,
            updated_at: now,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn replace_session(&self, id: Uuid, slot: Option<SessionSlot>) -> StoreResult<bool> {
        let mut users = self.users.lock().await;
        let Some(u) = users.get_mut(&id) else {
            return Ok(false);
        };
        match slot {
            Some(s) => {
                u.refresh_token_id = Some(s.token_id);
                u.refresh_token_hash = Some(s.token_hash);
            }
            None => {
                u.refresh_token_id = None;
                u.refresh_token_hash = None;
            }
        }
        u.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }

    async fn rotate_session(
        &self,
        id: Uuid,
        expected: Uuid,
        next: SessionSlot,
    ) -> StoreResult<bool> {
        let mut users = self.users.lock().await;
        match users.get_mut(&id) {
            Some(u) if u.refresh_token_id == Some(expected) => {
                u.refresh_token_id = Some(next.token_id);
                u.refresh_token_hash = Some(next.token_hash);
                u.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Role;

    fn new_user(email: &str, tenant_id: i32) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "hash".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            tenant_id,
            role: Role::Viewer,
            session: slot(),
        }
    }

    fn slot() -> SessionSlot {
        SessionSlot {
            token_id: Uuid::new_v4(),
            token_hash: "h".into(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email_case_insensitively() {
        let store = InMemoryCredentialStore::default();
        store.insert(new_user("a@example.com", 1)).await.unwrap();
        let err = store.insert(new_user("A@Example.com", 1)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn insert_rejects_unknown_tenant() {
        let store = InMemoryCredentialStore::default();
        let err = store.insert(new_user("a@example.com", 42)).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownTenant(42)));
    }

    #[tokio::test]
    async fn insert_stores_the_first_session() {
        let store = InMemoryCredentialStore::default();
        let new = new_user("a@example.com", 1);
        let session = new.session.clone();
        let user = store.insert(new).await.unwrap();
        assert_eq!(user.refresh_token_id, Some(session.token_id));
        assert_eq!(user.refresh_token_hash, Some(session.token_hash));
    }

    #[tokio::test]
    async fn rotate_only_matches_expected_id() {
        let store = InMemoryCredentialStore::default();
        let new = new_user("a@example.com", 1);
        let first = new.session.clone();
        let user = store.insert(new).await.unwrap();

        let second = slot();
        assert!(store.rotate_session(user.id, first.token_id, second.clone()).await.unwrap());
        assert!(!store.rotate_session(user.id, first.token_id, slot()).await.unwrap());

        let row = store.get(user.id).await.unwrap();
        assert_eq!(row.refresh_token_id, Some(second.token_id));
    }

    #[tokio::test]
    async fn replace_session_on_missing_user_reports_false() {
        let store = InMemoryCredentialStore::default();
        assert!(!store.replace_session(Uuid::new_v4(), None).await.unwrap());
    }
}

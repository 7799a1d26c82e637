//! In-memory user store guarded by a Tokio mutex, for single-node deployments and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{StoreError, UserStore};
use crate::models::{RefreshTokenRecord, User};

#[derive(Debug, Default)]
struct InnerState {
    users: HashMap<Uuid, User>,
    /// Normalized email -> user id
    emails: HashMap<String, Uuid>,
    tokens: HashMap<Uuid, Vec<RefreshTokenRecord>>,
    /// Token digest -> owning user, enforcing one owner per token
    token_owners: HashMap<String, Uuid>,
}

impl InnerState {
    fn insert_token(&mut self, user_id: Uuid, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        if self.token_owners.contains_key(&record.token_hash) {
            return Err(StoreError::DuplicateToken);
        }
        self.token_owners.insert(record.token_hash.clone(), user_id);
        self.tokens.entry(user_id).or_default().push(record.clone());
        Ok(())
    }

    fn remove_token(&mut self, user_id: Uuid, token_hash: &str) -> bool {
        let Some(records) = self.tokens.get_mut(&user_id) else {
            return false;
        };
        let before = records.len();
        records.retain(|r| r.token_hash != token_hash);
        let removed = records.len() != before;
        if removed {
            self.token_owners.remove(token_hash);
        }
        removed
    }
}

/// In-memory [`UserStore`]. Every operation holds the lock for its whole
/// read-modify-write, so conditional replaces are atomic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users held
    pub async fn user_count(&self) -> usize {
        self.state.lock().await.users.len()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.users.get(id))
            .cloned())
    }

    async fn create(&self, user: &User, initial: &RefreshTokenRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;

        if state.emails.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if state.token_owners.contains_key(&initial.token_hash) {
            return Err(StoreError::DuplicateToken);
        }

        state.emails.insert(user.email.clone(), user.id);
        state.users.insert(user.id, user.clone());
        state.insert_token(user.id, initial)
    }

    async fn add_refresh_token(
        &self,
        user_id: Uuid,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::Database(format!("no user {}", user_id)));
        }
        state.insert_token(user_id, record)
    }

    async fn refresh_tokens(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tokens.get(&user_id).cloned().unwrap_or_default())
    }

    async fn has_refresh_token(&self, user_id: Uuid, token_hash: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.token_owners.get(token_hash) == Some(&user_id))
    }

    async fn replace_refresh_token(
        &self,
        user_id: Uuid,
        old_hash: &str,
        new: &RefreshTokenRecord,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;

        if state.token_owners.get(old_hash) != Some(&user_id) {
            return Ok(false);
        }
        if state.token_owners.contains_key(&new.token_hash) {
            return Err(StoreError::DuplicateToken);
        }

        state.remove_token(user_id, old_hash);
        state.insert_token(user_id, new)?;
        Ok(true)
    }

    async fn revoke_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
    ) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.remove_token(user_id, token_hash))
    }

    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let records = state.tokens.remove(&user_id).unwrap_or_default();
        for record in &records {
            state.token_owners.remove(&record.token_hash);
        }
        Ok(records.len() as u64)
    }

    async fn prune_refresh_tokens(
        &self,
        user_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let stale: Vec<String> = state
            .tokens
            .get(&user_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.created_at < cutoff)
                    .map(|r| r.token_hash.clone())
                    .collect()
            })
            .unwrap_or_default();

        for hash in &stale {
            state.remove_token(user_id, hash);
        }
        Ok(stale.len() as u64)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(user) = state.users.remove(&id) else {
            return Ok(false);
        };
        state.emails.remove(&user.email);
        for record in state.tokens.remove(&id).unwrap_or_default() {
            state.token_owners.remove(&record.token_hash);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(email: &str) -> User {
        User::new("Test".to_string(), email.to_string(), "hash".to_string())
    }

    fn record(hash: &str) -> RefreshTokenRecord {
        RefreshTokenRecord::new(hash.to_string())
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryUserStore::new();
        let alice = user("alice@ex.com");
        store.create(&alice, &record("t1")).await.unwrap();

        let by_email = store.find_by_email("alice@ex.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, alice.id);
        assert!(store.find_by_id(alice.id).await.unwrap().is_some());
        assert!(store.has_refresh_token(alice.id, "t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_writes_nothing() {
        let store = InMemoryUserStore::new();
        store.create(&user("a@ex.com"), &record("t1")).await.unwrap();

        let err = store.create(&user("a@ex.com"), &record("t2")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_token_belongs_to_one_user() {
        let store = InMemoryUserStore::new();
        let a = user("a@ex.com");
        let b = user("b@ex.com");
        store.create(&a, &record("shared")).await.unwrap();
        store.create(&b, &record("b1")).await.unwrap();

        let err = store.add_refresh_token(b.id, &record("shared")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateToken));
        assert!(!store.has_refresh_token(b.id, "shared").await.unwrap());
    }

    #[tokio::test]
    async fn test_conditional_replace() {
        let store = InMemoryUserStore::new();
        let a = user("a@ex.com");
        store.create(&a, &record("old")).await.unwrap();

        assert!(store.replace_refresh_token(a.id, "old", &record("new")).await.unwrap());
        // Second attempt with the same old token loses
        assert!(!store.replace_refresh_token(a.id, "old", &record("newer")).await.unwrap());

        let hashes: Vec<_> = store
            .refresh_tokens(a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.token_hash)
            .collect();
        assert_eq!(hashes, vec!["new".to_string()]);
    }

    #[tokio::test]
    async fn test_prune_and_revoke_all() {
        let store = InMemoryUserStore::new();
        let a = user("a@ex.com");
        let mut stale = record("stale");
        stale.created_at = Utc::now() - Duration::days(30);
        store.create(&a, &stale).await.unwrap();
        store.add_refresh_token(a.id, &record("fresh")).await.unwrap();

        let pruned = store
            .prune_refresh_tokens(a.id, Utc::now() - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        assert!(store.has_refresh_token(a.id, "fresh").await.unwrap());

        assert_eq!(store.revoke_all_refresh_tokens(a.id).await.unwrap(), 1);
        assert!(store.refresh_tokens(a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_cascades_tokens() {
        let store = InMemoryUserStore::new();
        let a = user("a@ex.com");
        store.create(&a, &record("t1")).await.unwrap();
        store.add_refresh_token(a.id, &record("t2")).await.unwrap();

        assert!(store.delete(a.id).await.unwrap());
        assert!(!store.delete(a.id).await.unwrap());
        assert!(!store.has_refresh_token(a.id, "t1").await.unwrap());
        assert!(store.find_by_email("a@ex.com").await.unwrap().is_none());

        // The email is free again
        store.create(&user("a@ex.com"), &record("t3")).await.unwrap();
    }
}

//! Credential store
//!
//! Persistence of user records and their refresh token sets behind a single
//! async trait, with a Postgres implementation for production and an
//! in-memory one for single-node use and tests.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{RefreshTokenRecord, User};

pub use memory::InMemoryUserStore;
pub use postgres::PgUserStore;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Email already exists")]
    DuplicateEmail,

    #[error("Refresh token already stored")]
    DuplicateToken,

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Persistence operations on users and their refresh token records.
///
/// Token arguments are always SHA-256 digests, never raw tokens.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Check connectivity.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Look up by an already normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Insert a new user together with its first refresh token record.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken; in that
    /// case nothing is written.
    async fn create(&self, user: &User, initial: &RefreshTokenRecord) -> Result<(), StoreError>;

    /// Append a record to the user's set. Other records are untouched.
    async fn add_refresh_token(
        &self,
        user_id: Uuid,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError>;

    /// All records currently held by the user.
    async fn refresh_tokens(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError>;

    async fn has_refresh_token(&self, user_id: Uuid, token_hash: &str) -> Result<bool, StoreError>;

    /// Conditionally swap `old_hash` for `new`.
    ///
    /// Returns `false` without writing anything when `old_hash` is no longer in
    /// the user's set, which is how a losing concurrent rotation is detected.
    async fn replace_refresh_token(
        &self,
        user_id: Uuid,
        old_hash: &str,
        new: &RefreshTokenRecord,
    ) -> Result<bool, StoreError>;

    /// Remove one record. Returns whether it was present.
    async fn revoke_refresh_token(&self, user_id: Uuid, token_hash: &str)
        -> Result<bool, StoreError>;

    /// Remove every record for the user. Returns how many were removed.
    async fn revoke_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError>;

    /// Drop records created before `cutoff`.
    async fn prune_refresh_tokens(
        &self,
        user_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Delete the user and all of its refresh token records.
    /// Returns whether the user existed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

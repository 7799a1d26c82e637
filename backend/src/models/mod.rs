//! Data models for AuthGate

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// Role assigned to new accounts
pub const DEFAULT_ROLE: &str = "user";

/// User model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh user record with a system generated id and the default role
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            role: DEFAULT_ROLE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Stored refresh token.
///
/// Only the SHA-256 digest of the token is kept; matching a presented token is
/// an exact comparison of digests.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(token_hash: String) -> Self {
        Self {
            token_hash,
            created_at: Utc::now(),
        }
    }
}

/// Normalize an email address for storage and lookup
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

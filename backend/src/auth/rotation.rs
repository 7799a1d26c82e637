//! Refresh token rotation
//!
//! A refresh token moves through `issued -> active -> rotated | revoked`.
//! It is minted (issued), becomes active once its digest is stored, and leaves
//! the active state either by being exchanged for a successor (rotated) or by
//! being deleted on logout or account deletion (revoked). Only active tokens
//! can be exchanged; the store cannot tell rotated from revoked, and both are
//! rejected the same way.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::jwt::{hash_token, JwtError, TokenIssuer};
use crate::models::{RefreshTokenRecord, User};
use crate::store::{StoreError, UserStore};

#[derive(Error, Debug)]
pub enum RotationError {
    #[error("Refresh token failed verification: {0}")]
    InvalidToken(JwtError),

    #[error("Refresh token subject does not exist")]
    UnknownSubject,

    #[error("Refresh token is not active")]
    NotActive,

    #[error("Refresh token was rotated by a concurrent request")]
    Superseded,

    #[error("Token signing failed: {0}")]
    Signing(JwtError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Freshly minted token pair plus the record that activates the refresh token
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub record: RefreshTokenRecord,
}

/// Result of a successful rotation
#[derive(Debug, Clone)]
pub struct RotatedSession {
    pub user: User,
    pub tokens: SessionTokens,
}

pub struct RotationEngine {
    store: Arc<dyn UserStore>,
    issuer: Arc<TokenIssuer>,
}

impl RotationEngine {
    pub fn new(store: Arc<dyn UserStore>, issuer: Arc<TokenIssuer>) -> Self {
        Self { store, issuer }
    }

    /// Mint an access/refresh pair. Nothing is persisted.
    pub fn mint(&self, user: &User) -> Result<SessionTokens, RotationError> {
        self.mint_at(user, Utc::now())
    }

    fn mint_at(&self, user: &User, now: DateTime<Utc>) -> Result<SessionTokens, RotationError> {
        let refresh_token = self
            .issuer
            .issue_refresh_token_at(user, now)
            .map_err(RotationError::Signing)?;
        let access_token = self
            .issuer
            .issue_access_token_at(user, now)
            .map_err(RotationError::Signing)?;

        Ok(SessionTokens {
            record: RefreshTokenRecord {
                token_hash: hash_token(&refresh_token),
                created_at: now,
            },
            access_token,
            refresh_token,
        })
    }

    /// Store a minted refresh token next to the user's existing ones.
    pub async fn activate(&self, user_id: Uuid, tokens: &SessionTokens) -> Result<(), RotationError> {
        self.store.add_refresh_token(user_id, &tokens.record).await?;
        Ok(())
    }

    /// Exchange an active refresh token for a new pair.
    pub async fn rotate(&self, presented: &str) -> Result<RotatedSession, RotationError> {
        self.rotate_at(presented, Utc::now()).await
    }

    pub async fn rotate_at(
        &self,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<RotatedSession, RotationError> {
        let claims = self
            .issuer
            .verify_refresh_token_at(presented, now)
            .map_err(|e| {
                tracing::warn!(error = %e, "Refresh token rejected");
                RotationError::InvalidToken(e)
            })?;
        let user_id = claims.user_id().map_err(RotationError::InvalidToken)?;

        let user = self.store.find_by_id(user_id).await?.ok_or_else(|| {
            tracing::warn!(user_id = %user_id, "Refresh token for unknown user");
            RotationError::UnknownSubject
        })?;

        let old_hash = hash_token(presented);
        if !self.store.has_refresh_token(user.id, &old_hash).await? {
            // Signature is fine but the token was already rotated or revoked
            tracing::warn!(user_id = %user.id, "Inactive refresh token presented");
            return Err(RotationError::NotActive);
        }

        let tokens = self.mint_at(&user, now)?;

        // The old record only disappears together with the insert of the new one
        let replaced = self
            .store
            .replace_refresh_token(user.id, &old_hash, &tokens.record)
            .await?;
        if !replaced {
            tracing::warn!(user_id = %user.id, "Lost refresh token rotation race");
            return Err(RotationError::Superseded);
        }

        tracing::info!(user_id = %user.id, "Refresh token rotated");
        Ok(RotatedSession { user, tokens })
    }

    /// Revoke the stored record of one presented refresh token.
    /// Returns whether a record was removed.
    pub async fn revoke(&self, presented: &str) -> Result<bool, RotationError> {
        let claims = self
            .issuer
            .verify_refresh_token(presented)
            .map_err(RotationError::InvalidToken)?;
        let user_id = claims.user_id().map_err(RotationError::InvalidToken)?;

        let revoked = self
            .store
            .revoke_refresh_token(user_id, &hash_token(presented))
            .await?;
        if revoked {
            tracing::info!(user_id = %user_id, "Refresh token revoked");
        }
        Ok(revoked)
    }
}

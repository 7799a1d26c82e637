//! Authentication service
//!
//! Core business logic for password accounts: registration, login, token
//! refresh, logout and account deletion.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{normalize_email, User};
use crate::store::{StoreError, UserStore};

use super::jwt::TokenIssuer;
use super::password::{PasswordError, PasswordHasher};
use super::rotation::{RotatedSession, RotationEngine, RotationError, SessionTokens};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    MissingFields(&'static str),

    #[error("Email already exists")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// What logout does with the server-side refresh token record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoutMode {
    /// Only the client cookie is cleared; the stored record stays usable
    #[default]
    ClearCookie,
    /// The presented token's stored record is revoked as well
    RevokeStored,
}

/// A signed-in user with a fresh token pair
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

impl From<RotatedSession> for AuthSession {
    fn from(rotated: RotatedSession) -> Self {
        let SessionTokens {
            access_token,
            refresh_token,
            ..
        } = rotated.tokens;
        Self {
            user: rotated.user,
            access_token,
            refresh_token,
        }
    }
}

/// Authentication service
pub struct AuthService {
    store: Arc<dyn UserStore>,
    issuer: Arc<TokenIssuer>,
    rotation: RotationEngine,
    hasher: PasswordHasher,
    logout_mode: LogoutMode,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        store: Arc<dyn UserStore>,
        issuer: Arc<TokenIssuer>,
        hasher: PasswordHasher,
        logout_mode: LogoutMode,
    ) -> Self {
        Self {
            rotation: RotationEngine::new(store.clone(), issuer.clone()),
            store,
            issuer,
            hasher,
            logout_mode,
        }
    }

    /// Create an account and sign it in
    pub async fn register(
        &self,
        name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<AuthSession, AuthError> {
        let email = email.map(normalize_email).unwrap_or_default();
        let (name, password) = match (name, password) {
            (Some(n), Some(p)) if !n.is_empty() && !p.is_empty() && !email.is_empty() => (n, p),
            _ => return Err(AuthError::MissingFields("All fields required")),
        };

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hasher.hash(password).await?;
        let user = User::new(name.to_string(), email, password_hash);
        let tokens = self.rotation.mint(&user)?;

        // The unique index still catches a registration racing this one
        self.store
            .create(&user, &tokens.record)
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail => AuthError::EmailTaken,
                other => AuthError::Store(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");

        Ok(AuthSession {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Verify credentials and open an additional session
    pub async fn login(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<AuthSession, AuthError> {
        let email = email.map(normalize_email).unwrap_or_default();
        let password = match password {
            Some(p) if !p.is_empty() && !email.is_empty() => p,
            _ => return Err(AuthError::MissingFields("Email and password required")),
        };

        let Some(user) = self.store.find_by_email(&email).await? else {
            tracing::debug!("Login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let cutoff = Utc::now() - self.issuer.refresh_ttl();
        let pruned = self.store.prune_refresh_tokens(user.id, cutoff).await?;
        if pruned > 0 {
            tracing::debug!(user_id = %user.id, pruned, "Pruned expired refresh tokens");
        }

        let tokens = self.rotation.mint(&user)?;
        self.rotation.activate(user.id, &tokens).await?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(AuthSession {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Exchange a refresh token for a new pair
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        Ok(self.rotation.rotate(refresh_token).await?.into())
    }

    /// Handle logout for the token found in the caller's cookie, if any.
    ///
    /// Never fails: in [`LogoutMode::RevokeStored`] a token that cannot be
    /// revoked is logged and otherwise ignored.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let (LogoutMode::RevokeStored, Some(token)) = (self.logout_mode, refresh_token) else {
            return;
        };

        match self.rotation.revoke(token).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Logout token had no stored record"),
            Err(RotationError::Store(e)) => {
                tracing::error!(error = %e, "Failed to revoke refresh token on logout")
            }
            Err(e) => tracing::debug!(error = %e, "Logout token not revocable"),
        }
    }

    /// Delete the account and every refresh token it holds
    pub async fn delete_account(&self, user_id: Uuid) -> Result<(), AuthError> {
        let revoked = self.store.revoke_all_refresh_tokens(user_id).await?;
        if self.store.delete(user_id).await? {
            tracing::info!(user_id = %user_id, revoked, "Account deleted");
        } else {
            tracing::debug!(user_id = %user_id, "Account already gone");
        }
        Ok(())
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Check the backing store is reachable
    pub async fn store_healthy(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_token, JwtConfig};
    use crate::store::InMemoryUserStore;

    fn service_with(store: Arc<InMemoryUserStore>, mode: LogoutMode) -> AuthService {
        let config = JwtConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_ttl_seconds: 900,
            refresh_ttl_days: 7,
        };
        AuthService::new(
            store,
            Arc::new(TokenIssuer::new(&config)),
            PasswordHasher::new(4),
            mode,
        )
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let store = Arc::new(InMemoryUserStore::new());
        let service = service_with(store.clone(), LogoutMode::ClearCookie);

        let session = service
            .register(Some("Alice"), Some("  alice@EX.com "), Some("pw1234"))
            .await
            .unwrap();
        assert_eq!(session.user.email, "alice@ex.com");
        assert_ne!(session.user.password_hash, "pw1234");

        let stored = store.refresh_tokens(session.user.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].token_hash, hash_token(&session.refresh_token));
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let service = service_with(Arc::new(InMemoryUserStore::new()), LogoutMode::ClearCookie);

        for (name, email, password) in [
            (None, Some("a@ex.com"), Some("pw")),
            (Some("A"), None, Some("pw")),
            (Some("A"), Some("a@ex.com"), None),
            (Some(""), Some("a@ex.com"), Some("pw")),
            (Some("A"), Some("   "), Some("pw")),
        ] {
            assert!(matches!(
                service.register(name, email, password).await,
                Err(AuthError::MissingFields(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_email_case_insensitive() {
        let store = Arc::new(InMemoryUserStore::new());
        let service = service_with(store.clone(), LogoutMode::ClearCookie);

        service
            .register(Some("Alice"), Some("alice@ex.com"), Some("pw1234"))
            .await
            .unwrap();
        let second = service
            .register(Some("Alice 2"), Some("ALICE@ex.com"), Some("other"))
            .await;
        assert!(matches!(second, Err(AuthError::EmailTaken)));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_login_round_trip_and_failures() {
        let service = service_with(Arc::new(InMemoryUserStore::new()), LogoutMode::ClearCookie);
        service
            .register(Some("Alice"), Some("alice@EX.com"), Some("pw1234"))
            .await
            .unwrap();

        let session = service
            .login(Some("alice@ex.com"), Some("pw1234"))
            .await
            .unwrap();
        assert_eq!(session.user.email, "alice@ex.com");

        let wrong_password = service.login(Some("alice@ex.com"), Some("wrong")).await;
        let unknown_user = service.login(Some("bob@ex.com"), Some("pw1234")).await;
        assert_eq!(
            wrong_password.unwrap_err().to_string(),
            unknown_user.unwrap_err().to_string()
        );
    }

    #[tokio::test]
    async fn test_login_keeps_other_sessions() {
        let store = Arc::new(InMemoryUserStore::new());
        let service = service_with(store.clone(), LogoutMode::ClearCookie);
        let registered = service
            .register(Some("Alice"), Some("alice@ex.com"), Some("pw1234"))
            .await
            .unwrap();
        service
            .login(Some("alice@ex.com"), Some("pw1234"))
            .await
            .unwrap();

        assert_eq!(store.refresh_tokens(registered.user.id).await.unwrap().len(), 2);
        assert!(service.refresh(&registered.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_default_logout_leaves_record() {
        let service = service_with(Arc::new(InMemoryUserStore::new()), LogoutMode::ClearCookie);
        let session = service
            .register(Some("Alice"), Some("alice@ex.com"), Some("pw1234"))
            .await
            .unwrap();

        service.logout(Some(&session.refresh_token)).await;
        assert!(service.refresh(&session.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_strict_logout_revokes_record() {
        let service = service_with(Arc::new(InMemoryUserStore::new()), LogoutMode::RevokeStored);
        let session = service
            .register(Some("Alice"), Some("alice@ex.com"), Some("pw1234"))
            .await
            .unwrap();

        service.logout(Some(&session.refresh_token)).await;
        assert!(matches!(
            service.refresh(&session.refresh_token).await,
            Err(AuthError::Rotation(RotationError::NotActive))
        ));

        // Garbage or missing cookies are tolerated
        service.logout(Some("garbage")).await;
        service.logout(None).await;
    }

    #[tokio::test]
    async fn test_delete_account_invalidates_all_refresh_tokens() {
        let service = service_with(Arc::new(InMemoryUserStore::new()), LogoutMode::ClearCookie);
        let first = service
            .register(Some("Alice"), Some("alice@ex.com"), Some("pw1234"))
            .await
            .unwrap();
        let second = service
            .login(Some("alice@ex.com"), Some("pw1234"))
            .await
            .unwrap();

        service.delete_account(first.user.id).await.unwrap();

        for token in [&first.refresh_token, &second.refresh_token] {
            assert!(service.refresh(token).await.is_err());
        }
        assert!(matches!(
            service.get_user_by_id(first.user.id).await,
            Err(AuthError::UserNotFound)
        ));
        // Deleting again is not an error
        service.delete_account(first.user.id).await.unwrap();
    }
}

//! JWT token generation and validation
//!
//! Access and refresh tokens are signed with separate HS256 secrets. Each token
//! kind has exactly one claim schema; anything else fails to decode.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::models::User;

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

/// Signing secrets and lifetimes for both token kinds
#[derive(Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    /// Access token time-to-live in seconds (default: 900 = 15 minutes)
    pub access_ttl_seconds: i64,
    /// Refresh token time-to-live in days (default: 7)
    pub refresh_ttl_days: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"****")
            .field("refresh_secret", &"****")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .finish()
    }
}

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// User role
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Claims carried by a refresh token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Random id, so two tokens minted in the same second differ
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

trait Expiring {
    fn exp(&self) -> i64;
    fn sub(&self) -> &str;
}

impl Expiring for AccessClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
    fn sub(&self) -> &str {
        &self.sub
    }
}

impl Expiring for RefreshClaims {
    fn exp(&self) -> i64 {
        self.exp
    }
    fn sub(&self) -> &str {
        &self.sub
    }
}

impl AccessClaims {
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        parse_subject(&self.sub)
    }
}

impl RefreshClaims {
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        parse_subject(&self.sub)
    }
}

fn parse_subject(sub: &str) -> Result<Uuid, JwtError> {
    Uuid::parse_str(sub).map_err(|e| JwtError::InvalidToken(e.to_string()))
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked in `decode_at` against an explicit clock, with no leeway
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}

/// Decode and check a token against `now`. A token is expired from its `exp`
/// second onwards.
fn decode_at<T>(token: &str, key: &DecodingKey, now: DateTime<Utc>) -> Result<T, JwtError>
where
    T: DeserializeOwned + Expiring,
{
    let token_data = decode::<T>(token, key, &validation()).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => JwtError::TokenExpired,
        _ => JwtError::DecodingFailed(e.to_string()),
    })?;

    let claims = token_data.claims;
    if now.timestamp() >= claims.exp() {
        return Err(JwtError::TokenExpired);
    }
    parse_subject(claims.sub())?;

    Ok(claims)
}

fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> Result<String, JwtError> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| JwtError::EncodingFailed(e.to_string()))
}

/// Mints access and refresh tokens and verifies refresh tokens.
pub struct TokenIssuer {
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    refresh_decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            access_key: EncodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_key: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding_key: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            access_ttl: Duration::seconds(config.access_ttl_seconds),
            refresh_ttl: Duration::days(config.refresh_ttl_days),
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Generate an access token for a user
    pub fn issue_access_token(&self, user: &User) -> Result<String, JwtError> {
        self.issue_access_token_at(user, Utc::now())
    }

    pub fn issue_access_token_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let claims = AccessClaims {
            sub: user.id.to_string(),
            role: user.role.clone(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        sign(&claims, &self.access_key)
    }

    /// Generate a refresh token for a user
    pub fn issue_refresh_token(&self, user: &User) -> Result<String, JwtError> {
        self.issue_refresh_token_at(user, Utc::now())
    }

    pub fn issue_refresh_token_at(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<String, JwtError> {
        let claims = RefreshClaims {
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        sign(&claims, &self.refresh_key)
    }

    /// Verify signature, shape and expiry of a refresh token
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        self.verify_refresh_token_at(token, Utc::now())
    }

    pub fn verify_refresh_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, JwtError> {
        decode_at(token, &self.refresh_decoding_key, now)
    }
}

/// Verifies access tokens. Holds only the access secret.
pub struct AccessTokenVerifier {
    decoding_key: DecodingKey,
}

impl AccessTokenVerifier {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.access_secret.as_bytes()),
        }
    }

    pub fn verify(&self, token: &str) -> Result<AccessClaims, JwtError> {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccessClaims, JwtError> {
        decode_at(token, &self.decoding_key, now)
    }
}

/// SHA-256 hex digest of a token, used as its storage key
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

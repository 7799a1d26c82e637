//! Session gate
//!
//! Stateless check of `Authorization: Bearer <access token>`. No store lookup
//! happens here, so an access token stays usable until it expires even if the
//! account is deleted in the meantime.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::jwt::{AccessTokenVerifier, JwtConfig, JwtError};

#[derive(Error, Debug)]
pub enum GateError {
    #[error("No token provided")]
    MissingHeader,

    #[error("Invalid token format")]
    MalformedHeader,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token: {0}")]
    InvalidToken(JwtError),
}

/// Caller identity resolved from a valid access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: String,
}

pub struct SessionGate {
    verifier: AccessTokenVerifier,
}

impl SessionGate {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            verifier: AccessTokenVerifier::new(config),
        }
    }

    pub fn authenticate(&self, header: Option<&str>) -> Result<Identity, GateError> {
        self.authenticate_at(header, Utc::now())
    }

    pub fn authenticate_at(
        &self,
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Identity, GateError> {
        let header = header.ok_or(GateError::MissingHeader)?;
        let token = parse_bearer(header).ok_or(GateError::MalformedHeader)?;

        let claims = self.verifier.verify_at(token, now).map_err(|e| match e {
            JwtError::TokenExpired => GateError::Expired,
            other => GateError::InvalidToken(other),
        })?;
        let user_id = claims.user_id().map_err(GateError::InvalidToken)?;

        Ok(Identity {
            user_id,
            role: claims.role,
        })
    }
}

/// Exactly `Bearer <token>`: one space, case-sensitive scheme, non-empty token.
fn parse_bearer(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenIssuer;
    use crate::models::User;
    use chrono::Duration;

    fn config() -> JwtConfig {
        JwtConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_ttl_seconds: 900,
            refresh_ttl_days: 7,
        }
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("bearer abc"), None);
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer a b"), None);
        assert_eq!(parse_bearer("Bearer  abc"), None);
    }

    #[test]
    fn test_authenticate_resolves_identity() {
        let config = config();
        let user = User::new("Alice".into(), "alice@ex.com".into(), "hash".into());
        let token = TokenIssuer::new(&config).issue_access_token(&user).unwrap();

        let identity = SessionGate::new(&config)
            .authenticate(Some(&format!("Bearer {}", token)))
            .unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.role, "user");
    }

    #[test]
    fn test_authenticate_rejections() {
        let config = config();
        let gate = SessionGate::new(&config);
        let user = User::new("Alice".into(), "alice@ex.com".into(), "hash".into());
        let issuer = TokenIssuer::new(&config);

        assert!(matches!(gate.authenticate(None), Err(GateError::MissingHeader)));
        assert!(matches!(
            gate.authenticate(Some("Token abc")),
            Err(GateError::MalformedHeader)
        ));

        let refresh = issuer.issue_refresh_token(&user).unwrap();
        assert!(matches!(
            gate.authenticate(Some(&format!("Bearer {}", refresh))),
            Err(GateError::InvalidToken(_))
        ));

        let issued = Utc::now();
        let access = issuer.issue_access_token_at(&user, issued).unwrap();
        let header = format!("Bearer {}", access);
        assert!(gate
            .authenticate_at(Some(&header), issued + Duration::seconds(899))
            .is_ok());
        assert!(matches!(
            gate.authenticate_at(Some(&header), issued + Duration::seconds(900)),
            Err(GateError::Expired)
        ));
    }
}

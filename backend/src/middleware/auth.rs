//! Authentication middleware
//!
//! Extractor that runs the session gate on the `Authorization` header.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{GateError, SessionGate};
use crate::error::ApiError;

/// Authenticated user extracted from the access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    /// Role claim of the access token, for handlers that authorize by role
    pub role: String,
}

/// Extractor for authenticated users
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<SessionGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<SessionGate>::from_ref(state);

        // A header that is not visible ASCII counts as malformed, not missing
        let header = match parts.headers.get(header::AUTHORIZATION) {
            None => None,
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| reject(GateError::MalformedHeader))?,
            ),
        };

        let identity = gate.authenticate(header).map_err(reject)?;

        Ok(AuthenticatedUser {
            user_id: identity.user_id,
            role: identity.role,
        })
    }
}

fn reject(err: GateError) -> Response {
    tracing::debug!(error = %err, "Access token rejected");
    let message = match err {
        GateError::MissingHeader | GateError::MalformedHeader => err.to_string(),
        GateError::Expired | GateError::InvalidToken(_) => "Invalid or expired token".to_string(),
    };
    ApiError::Unauthorized(message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    use crate::auth::{JwtConfig, TokenIssuer};
    use crate::models::User;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            access_secret: "access-secret".to_string(),
            refresh_secret: "refresh-secret".to_string(),
            access_ttl_seconds: 900,
            refresh_ttl_days: 7,
        }
    }

    async fn extract(authorization: Option<String>) -> Result<AuthenticatedUser, Response> {
        let gate = Arc::new(SessionGate::new(&jwt_config()));
        let mut builder = Request::builder().uri("/api/user/profile");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthenticatedUser::from_request_parts(&mut parts, &gate).await
    }

    #[tokio::test]
    async fn test_extracts_identity_with_role() {
        let user = User::new("Alice".into(), "alice@ex.com".into(), "hash".into());
        let token = TokenIssuer::new(&jwt_config())
            .issue_access_token(&user)
            .unwrap();

        let authenticated = extract(Some(format!("Bearer {}", token))).await.unwrap();
        assert_eq!(authenticated.user_id, user.id);
        assert_eq!(authenticated.role, "user");
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let rejection = extract(None).await.unwrap_err();
        assert_eq!(rejection.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}

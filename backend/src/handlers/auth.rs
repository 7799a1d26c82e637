//! Authentication HTTP handlers
//!
//! Access tokens travel in the JSON body; refresh tokens only in the
//! `refreshToken` cookie.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::CookieJar;

use crate::auth::{AuthSession, REFRESH_COOKIE_NAME};
use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedUser;
use crate::models::{AuthResponse, LoginRequest, MessageResponse, RegisterRequest, UserResponse};
use crate::state::AppState;

fn session_response(
    state: &AppState,
    jar: CookieJar,
    session: AuthSession,
    message: Option<&str>,
) -> (CookieJar, Json<AuthResponse>) {
    let jar = jar.add(state.refresh_cookie.issue(session.refresh_token));
    let body = AuthResponse {
        message: message.map(str::to_string),
        user: UserResponse::from(&session.user),
        access_token: session.access_token,
    };
    (jar, Json(body))
}

/// POST /api/auth/register - Create an account and start a session
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let Json(req) = payload?;

    let session = state
        .auth_service
        .register(
            req.name.as_deref(),
            req.email.as_deref(),
            req.password.as_deref(),
        )
        .await?;

    let (jar, body) = session_response(&state, jar, session, None);
    Ok((StatusCode::CREATED, jar, body))
}

/// POST /api/auth/login - Verify credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    let Json(req) = payload?;

    let session = state
        .auth_service
        .login(req.email.as_deref(), req.password.as_deref())
        .await?;

    Ok(session_response(&state, jar, session, Some("Login successful")))
}

/// POST /api/auth/refresh - Rotate the refresh cookie and mint a new access token
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    let token = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("No refresh token".to_string()))?;

    let session = state.auth_service.refresh(&token).await?;

    Ok(session_response(&state, jar, session, None))
}

/// POST /api/auth/logout - Clear the refresh cookie
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let token = jar.get(REFRESH_COOKIE_NAME).map(|c| c.value().to_string());
    state.auth_service.logout(token.as_deref()).await;

    (
        jar.remove(state.refresh_cookie.clear()),
        Json(MessageResponse::new("Logged out")),
    )
}

/// DELETE /api/auth/me - Delete the authenticated account
pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<MessageResponse>)> {
    state.auth_service.delete_account(user.user_id).await?;

    Ok((
        jar.remove(state.refresh_cookie.clear()),
        Json(MessageResponse::new("Account deleted successfully")),
    ))
}

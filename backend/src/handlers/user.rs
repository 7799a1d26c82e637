//! User-related API handlers

use axum::{extract::State, Json};

use crate::error::ApiResult;
use crate::middleware::AuthenticatedUser;
use crate::models::ProfileResponse;
use crate::state::AppState;

/// GET /api/user/profile - Profile of the authenticated user, without secrets
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> ApiResult<Json<ProfileResponse>> {
    let user = state.auth_service.get_user_by_id(user.user_id).await?;

    Ok(Json(ProfileResponse { user: user.into() }))
}

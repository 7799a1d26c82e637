//! User route definitions

use axum::{routing::get, Router};

use crate::handlers::{auth::delete_account, user::get_profile};
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/api/user/profile", get(get_profile).delete(delete_account))
}

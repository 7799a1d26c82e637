//! Route definitions for the AuthGate API

mod auth;
mod user;

use axum::{routing::get, Router};

use crate::handlers::health;
use crate::state::AppState;

pub use auth::auth_routes;
pub use user::user_routes;

/// All API routes, without the outer middleware stack
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .merge(auth_routes())
        .merge(user_routes())
}

//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{AuthService, RefreshCookie, SessionGate};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub session_gate: Arc<SessionGate>,
    pub refresh_cookie: RefreshCookie,
}

impl AppState {
    pub fn new(
        auth_service: Arc<AuthService>,
        session_gate: Arc<SessionGate>,
        refresh_cookie: RefreshCookie,
    ) -> Self {
        Self {
            auth_service,
            session_gate,
            refresh_cookie,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<SessionGate> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.session_gate.clone()
    }
}

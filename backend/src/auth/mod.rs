//! Authentication module for AuthGate
//!
//! Provides password-based authentication with rotating refresh tokens.
//! - Access/refresh JWT generation and validation with separate secrets
//! - Refresh token rotation against the stored token set
//! - Stateless bearer checks for protected routes

mod cookie;
mod gate;
mod jwt;
mod password;
mod rotation;
mod service;

pub use cookie::{RefreshCookie, REFRESH_COOKIE_NAME};
pub use gate::{GateError, Identity, SessionGate};
pub use jwt::{
    hash_token, AccessClaims, AccessTokenVerifier, JwtConfig, JwtError, RefreshClaims,
    TokenIssuer,
};
pub use password::{PasswordError, PasswordHasher};
pub use rotation::{RotatedSession, RotationEngine, RotationError, SessionTokens};
pub use service::{AuthError, AuthService, AuthSession, LogoutMode};

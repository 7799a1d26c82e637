//! HTTP handlers for the AuthGate API

pub mod auth;
pub mod health;
pub mod user;

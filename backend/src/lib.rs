//! AuthGate Backend Library
//!
//! Session and authentication service: password accounts, short-lived access
//! tokens, and rotating refresh tokens tracked per user.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;

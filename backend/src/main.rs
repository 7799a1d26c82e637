//! AuthGate Backend Server
//!
//! HTTP server for password accounts with short-lived access tokens and
//! rotating refresh tokens delivered in an HttpOnly cookie.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tokio::signal;
use tower_http::cors::CorsLayer;

use authgate_server::auth::{AuthService, PasswordHasher, RefreshCookie, SessionGate, TokenIssuer};
use authgate_server::config::Config;
use authgate_server::db;
use authgate_server::middleware;
use authgate_server::routes;
use authgate_server::state::AppState;
use authgate_server::store::PgUserStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting AuthGate");

    let db_pool = db::create_pool(&config)
        .await
        .context("database connection failed")?;
    db::run_migrations(&db_pool)
        .await
        .context("database migrations failed")?;

    let store = Arc::new(PgUserStore::new(db_pool));
    let issuer = Arc::new(TokenIssuer::new(&config.jwt));
    let auth_service = Arc::new(AuthService::new(
        store,
        issuer,
        PasswordHasher::new(config.bcrypt_cost),
        config.logout_mode,
    ));
    let session_gate = Arc::new(SessionGate::new(&config.jwt));
    let refresh_cookie = RefreshCookie::new(
        config.environment.is_production(),
        config.jwt.refresh_ttl_days,
    );

    let app_state = AppState::new(auth_service, session_gate, refresh_cookie);

    let mut app = routes::api_router()
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers));

    if config.environment.is_production() {
        app = app.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let app: Router = app
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(&config)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Only the configured client origin may call the API with credentials
fn configure_cors(config: &Config) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = config
        .client_origin
        .parse()
        .context("CLIENT_ORIGIN is not a valid header value")?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

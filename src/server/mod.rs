//! HTTP server setup: router, shared state and startup.

pub mod error;
pub mod extract;
pub mod routes;
pub mod state;


use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{AuthService, mailer_from_config};
use crate::config::Config;
use crate::database::Database;
use crate::qa::{PipelineBuilder, QaEngine};

pub use error::ApiError;
pub use extract::CurrentUser;
pub use routes::ANSWER_STATUS_HEADER;
pub use state::ApiState;

/// Build the application router over `state`
#[inline]
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/token", post(routes::issue_token))
        .route("/refresh", post(routes::refresh_token))
        .route("/verify", get(routes::verify_email))
        .route("/resend", post(routes::resend_verification));

    Router::new()
        .route("/", get(routes::hello))
        .route("/health", get(routes::health))
        .route("/users", post(routes::create_user))
        .route("/users/me", post(routes::current_user))
        .route("/chat", post(routes::chat))
        .nest("/auth", auth_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Open the user store, build the QA engine, then serve until Ctrl-C.
///
/// The engine is fully initialized before the listener is bound, so no
/// request ever reaches an engine that is still building.
#[inline]
pub async fn serve(config: &Config) -> Result<()> {
    let database = Database::open(&config.database_path())
        .await
        .context("Failed to open user database")?;
    let mailer = mailer_from_config(config.mail.as_ref())?;
    let auth = AuthService::from_config(config, database, mailer)
        .context("Authentication is not configured")?;

    let qa = Arc::new(QaEngine::new());
    qa.init(PipelineBuilder::from_config(config)?)
        .await
        .context("Failed to initialize the QA engine")?;

    let app = router(Arc::new(ApiState::new(qa, auth)));
    let address = (config.server.host.as_str(), config.server.port);
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}:{}", address.0, address.1))?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

//! Gateway server setup
//!
//! Routes, state construction and the serve loop.

mod handler;
mod login;
mod origin;
mod response;
mod state;

pub use handler::{ws_handler, UpgradeParams};
pub use login::{login, LoginRequest, LoginResponse, ValidatedJson};
pub use origin::origin_allowed;
pub use response::{ApiError, ApiResult, ErrorBody, ErrorDetail};
pub use state::GatewayState;

use axum::{
    routing::{get, post},
    Router,
};
use relay_common::{AppConfig, AppError, StaticCredentials};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the gateway router
pub fn create_router() -> Router<GatewayState> {
    Router::new()
        .route("/login", post(login))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_check))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Build the complete application
pub fn create_app(state: GatewayState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Build the gateway state and start its background tasks
///
/// Must be called from within a Tokio runtime.
pub fn create_gateway_state(config: AppConfig) -> Result<GatewayState, AppError> {
    config.validate()?;

    let credentials = StaticCredentials::from_config(&config.auth)?;
    tracing::info!(username = %credentials.username(), "Credentials loaded");

    let state = GatewayState::new(config, Arc::new(credentials));

    let retention = state.tokens().retention();
    state
        .tokens()
        .spawn_sweeper(retention, state.shutdown().child_token());

    Ok(state)
}

/// Serve `state` on an already-bound listener until shutdown is requested
///
/// Cancelling [`GatewayState::shutdown`] stops the sweeper, closes every
/// connection and lets in-flight requests finish.
pub async fn serve(listener: TcpListener, state: GatewayState) -> Result<(), AppError> {
    let shutdown = state.shutdown().clone();
    let registry = state.registry().clone();

    let app = create_app(state).into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            let closed = registry.close_all();
            tracing::info!(closed = closed, "Relay shutting down");
        })
        .await
        .map_err(AppError::internal)
}

/// Run the relay with configuration until Ctrl+C
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.server.address();
    let state = create_gateway_state(config)?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Relay listening on http://{}", addr);

    let shutdown = state.shutdown().clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    serve(listener, state).await
}

//! Server module
//!
//! HTTP query surface and the WebSocket transport that feeds the session
//! coordinator.

pub mod http;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use thiserror::Error;
use tracing::info;

use crate::broadcast::Dispatcher;
use crate::config::Config;
use crate::polls::SessionCoordinator;

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared handles for every request and connection.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SessionCoordinator>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let dispatcher = Arc::new(Dispatcher::new());
        let coordinator =
            SessionCoordinator::new(config.poll, config.history_cap, dispatcher.clone());
        Self {
            coordinator,
            dispatcher,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::health_handler))
        .route("/api/poll-status", get(http::status_handler))
        .route("/api/poll-history", get(http::history_handler))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Run the server until ctrl-c.
pub async fn serve(config: Config) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let state = AppState::new(&config);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "pollroom listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

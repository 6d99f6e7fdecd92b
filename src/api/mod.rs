//! HTTP API module for Albumbot
//!
//! The platform adapter posts interactions here and listens on the event
//! stream for messages whose controls must be stripped.

mod auth;
pub mod routes;
mod sse;

use crate::catalog::CardStore;
use crate::error::{BotError, Result};
use crate::events::BotEvent;
use crate::router::InteractionRouter;
use crate::session::SessionStore;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<InteractionRouter>,
    pub store: CardStore,
    pub sessions: SessionStore,
    pub api_key: Option<String>,
    /// Broadcast channel feeding the SSE stream
    pub event_tx: broadcast::Sender<BotEvent>,
}

/// Start the HTTP API server
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    // Check if port is already in use (another albumbot instance running)
    if tokio::net::TcpStream::connect(addr).await.is_ok() {
        tracing::error!(
            "Port {} is already in use. Another albumbot instance may be running; \
             use `curl http://{}/health` to check.",
            addr.port(),
            addr
        );
        return Err(BotError::Api(format!("Port {} already in use", addr.port())));
    }

    let sessions = state.sessions.clone();
    let app = create_router(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await
        .map_err(|e| BotError::Api(e.to_string()))?;

    Ok(())
}

/// Create the API router with all routes
fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Interactions from the platform adapter
        .route("/interactions", post(routes::handle_interaction))
        // Catalog and albums
        .route("/cards", get(routes::list_cards))
        .route("/users/:id/categories", get(routes::user_categories))
        .route("/users/:id/cards", get(routes::user_cards))
        .route("/users/:id/cards/:card_id", get(routes::user_card))
        .route("/sessions", get(routes::list_sessions))
        // Server-Sent Events
        .route("/events", get(sse::events_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        // Health check (public, no auth required)
        .route("/health", get(routes::health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Graceful shutdown signal handler.
///
/// Open album menus are retired while the event stream is still up, so the
/// adapter gets a chance to strip their controls.
async fn shutdown_signal(sessions: SessionStore) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
    sessions.clear();
}

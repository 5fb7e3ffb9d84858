//! Serving the facilitator HTTP surface.
//!
//! [`serve`] binds an axum server exposing the facilitator routes with CORS
//! and request tracing, and shuts down gracefully on SIGINT/SIGTERM.

use axum::Router;
use axum::http::Method;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::{cors, trace::TraceLayer};

use x402_types::facilitator::FacilitatorClient;

use crate::handlers;

/// Errors raised while serving.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Serves the facilitator routes until a shutdown signal arrives.
pub async fn serve<A>(addr: SocketAddr, facilitator: A) -> Result<(), ServeError>
where
    A: FacilitatorClient + Clone + Send + Sync + 'static,
{
    let app = router(facilitator);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    tracing::info!("Starting facilitator at http://{}", addr);

    let cancellation = shutdown_token();
    let graceful = async move { cancellation.cancelled().await };
    axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .await?;
    Ok(())
}

/// Builds the full facilitator router (handlers + CORS + tracing), for
/// embedding into a larger axum application.
pub fn router<A>(facilitator: A) -> Router
where
    A: FacilitatorClient + Clone + Send + Sync + 'static,
{
    Router::new()
        .merge(handlers::routes().with_state(facilitator))
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        )
}

/// A token cancelled on SIGINT or SIGTERM.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let inner = token.clone();
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(%error, "Failed to listen for SIGINT");
            }
        };
        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(error) => tracing::warn!(%error, "Failed to listen for SIGTERM"),
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();
        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        inner.cancel();
    });
    token
}

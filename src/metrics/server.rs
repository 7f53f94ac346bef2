//! HTTP server for the Prometheus metrics and health endpoints.

use crate::metrics::MetricsRegistry;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening address could not be acquired.
    #[error("failed to bind to address {addr}: {source}")]
    Bind {
        /// Configured `host:port`.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Accepting or serving connections failed.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    /// In-flight requests had not drained when the deadline elapsed.
    #[error("graceful shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    /// `start` was called after the server had already started or stopped.
    #[error("server cannot be started from state {0:?}")]
    InvalidState(ServerState),
}

/// Lifecycle of the exposition server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Built, not yet bound.
    Constructed,
    /// Accepting connections.
    Listening,
    /// Listener closed.
    Stopped,
}

/// HTTP server exposing `/metrics` and `/health`.
///
/// [`start`](Self::start) occupies the calling task until the server stops;
/// [`stop`](Self::stop) is called from another task to end it.
pub struct MetricsServer {
    address: String,
    registry: MetricsRegistry,
    started: AtomicBool,
    local_addr: OnceLock<SocketAddr>,
    state: watch::Sender<ServerState>,
    shutdown: watch::Sender<bool>,
    force: watch::Sender<bool>,
}

impl MetricsServer {
    /// Creates a server for `address` (`host:port`) serving `registry`.
    pub fn new(address: impl Into<String>, registry: MetricsRegistry) -> Self {
        let (state, _) = watch::channel(ServerState::Constructed);
        let (shutdown, _) = watch::channel(false);
        let (force, _) = watch::channel(false);
        Self {
            address: address.into(),
            registry,
            started: AtomicBool::new(false),
            local_addr: OnceLock::new(),
            state,
            shutdown,
            force,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Address the listener is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Waits until the server has left [`ServerState::Constructed`] and
    /// returns the bound address, or `None` if binding failed.
    pub async fn listening(&self) -> Option<SocketAddr> {
        wait_until(self.state.subscribe(), |s| s != ServerState::Constructed).await;
        self.local_addr()
    }

    /// Binds the configured address and serves until [`stop`](Self::stop)
    /// is called.
    pub async fn start(&self) -> Result<(), ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::InvalidState(self.state()));
        }

        info!(
            addr = %self.address,
            network = self.registry.network(),
            "Starting metrics server"
        );

        let listener = match TcpListener::bind(self.address.as_str()).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state.send_replace(ServerState::Stopped);
                return Err(ServerError::Bind {
                    addr: self.address.clone(),
                    source,
                });
            }
        };
        if let Ok(addr) = listener.local_addr() {
            let _ = self.local_addr.set(addr);
        }
        self.state.send_replace(ServerState::Listening);

        info!(addr = ?self.local_addr(), "Metrics server listening");

        let graceful = self.shutdown.subscribe();
        let serve = axum::serve(listener, router(self.registry.clone()))
            .with_graceful_shutdown(wait_until(graceful, |requested| requested))
            .into_future();

        let result = tokio::select! {
            result = serve => result.map_err(ServerError::Serve),
            _ = wait_until(self.force.subscribe(), |forced| forced) => {
                warn!("Closing metrics listener with requests still in flight");
                Ok(())
            }
        };

        self.state.send_replace(ServerState::Stopped);
        info!("Metrics server stopped");
        result
    }

    /// Stops accepting connections and waits up to `deadline` for in-flight
    /// requests to finish.
    ///
    /// The listener is closed when the deadline elapses even if requests
    /// are still running; that case returns [`ServerError::ShutdownTimeout`].
    pub async fn stop(&self, deadline: Duration) -> Result<(), ServerError> {
        info!(?deadline, "Stopping metrics server");
        self.shutdown.send_replace(true);

        if !self.started.swap(true, Ordering::SeqCst) {
            self.state.send_replace(ServerState::Stopped);
            return Ok(());
        }

        let stopped = wait_until(self.state.subscribe(), |s| s == ServerState::Stopped);
        match tokio::time::timeout(deadline, stopped).await {
            Ok(()) => Ok(()),
            Err(_) => {
                self.force.send_replace(true);
                warn!(?deadline, "Metrics server shutdown deadline exceeded");
                Err(ServerError::ShutdownTimeout(deadline))
            }
        }
    }
}

/// Builds the exposition router for `registry`.
pub fn router(registry: MetricsRegistry) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn wait_until<T>(mut rx: watch::Receiver<T>, done: impl Fn(T) -> bool)
where
    T: Copy,
{
    loop {
        let current = *rx.borrow_and_update();
        if done(current) {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(registry): State<MetricsRegistry>) -> impl IntoResponse {
    match registry.encode() {
        Ok(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            output,
        ),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

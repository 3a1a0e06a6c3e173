//! HTTP dispatch and the four request handlers (§4.E–§4.H).

pub mod dispatch;
pub mod error_redirect;
pub mod simulator;
pub mod token_exchange;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::any;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::loader::LiveConfig;

/// Shared state every handler reads from: the live config snapshot
/// holder and the outbound HTTP client used for provider token POSTs.
#[derive(Clone)]
pub struct AppState {
    /// Atomically-published tenant registry + port.
    pub live: LiveConfig,
    /// Reused client for outbound provider requests (connection
    /// pooling, one 30s timeout applied per-request at the call site).
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Builds the shared state with a freshly configured HTTP client.
    #[must_use]
    pub fn new(live: LiveConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(crate::server::token_exchange::PROVIDER_TIMEOUT)
            .build()
            .expect("reqwest client with default TLS config always builds");
        Self { live, http_client }
    }
}

/// Builds the single-route axum router every listener instance serves.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", any(dispatch::handle))
        .layer(TimeoutLayer::new(Duration::from_secs(35)))
        .layer(CompressionLayer::new())
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

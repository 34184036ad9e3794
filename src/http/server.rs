//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Build the transport, the shared circuit breaker and the executor
//! - Invoke the executor once per inbound request and map its result

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ClientConfig, Strategy};
use crate::http::request::{request_id, MakeRequestUuid};
use crate::http::response::weather_body;
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::resilience::{
    build_executor, CircuitBreaker, CircuitBreakerSnapshot, Clock, ResilientCall, SystemClock,
};
use crate::transport::{HttpTransport, Transport, TransportError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub executor: Arc<dyn ResilientCall>,
    pub breaker: Arc<CircuitBreaker>,
    pub upstream_url: Arc<str>,
}

/// Wrapping HTTP server.
pub struct HttpServer {
    router: Router,
    config: ClientConfig,
    breaker: Arc<CircuitBreaker>,
}

impl HttpServer {
    /// Create a server that talks to the configured upstream over HTTP.
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeouts.upstream_secs))?;
        Ok(Self::with_transport(config, Arc::new(transport), Arc::new(SystemClock)))
    }

    /// Create a server with an explicit transport and breaker clock.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let breaker = Arc::new(CircuitBreaker::with_clock(&config.circuit_breaker, clock));
        let executor = build_executor(&config, transport, breaker.clone());

        let state = AppState {
            executor,
            breaker: breaker.clone(),
            upstream_url: Arc::from(config.upstream.url.as_str()),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            breaker,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ClientConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(weather_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The process-wide breaker instance.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Run the server until Ctrl+C / SIGTERM or a message on `shutdown`.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            strategy = %self.config.strategy,
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown_signal() => {}
                    _ = shutdown.recv() => {}
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Calls the upstream once through the executor.
async fn weather_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let request_id = request_id(&headers);

    let response = match state.executor.call(&state.upstream_url).await {
        Ok(payload) => (StatusCode::OK, weather_body(&payload)).into_response(),
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, kind = e.kind(), "Upstream call failed");
            e.into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}

async fn health_handler() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct StatusReport {
    version: &'static str,
    strategy: Strategy,
    upstream: String,
    circuit_breaker: CircuitBreakerSnapshot,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusReport> {
    Json(StatusReport {
        version: env!("CARGO_PKG_VERSION"),
        strategy: state.executor.strategy(),
        upstream: state.upstream_url.to_string(),
        circuit_breaker: state.breaker.snapshot(),
    })
}

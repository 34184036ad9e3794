//! Upstream transport subsystem.
//!
//! # Data Flow
//! ```text
//! Executor (retries.rs / gated.rs)
//!     → resilience::timeouts (deadline + cancellation)
//!     → Transport::dispatch(url)
//!     → TransportResponse { status, body } or TransportError
//! ```
//!
//! # Design Decisions
//! - The transport never classifies: it only reports what happened on the wire
//! - An `Err` means the call never produced a usable answer (connect, timeout, body read)
//! - Implementations are shared behind `Arc<dyn Transport>` so tests can script responses

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

pub use self::http::HttpTransport;

/// A completed upstream exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Failures below the HTTP status level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not establish a connection.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The per-call deadline elapsed.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The status line arrived but the payload could not be read.
    #[error("failed to read body: {0}")]
    Body(String),

    /// Any other transport-level failure (invalid URL, protocol error).
    #[error("request failed: {0}")]
    Request(String),
}

/// External transport collaborator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request against `url`.
    async fn dispatch(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

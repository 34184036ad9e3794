//! Resilient client for a flaky upstream HTTP dependency.
//!
//! Upstream calls go through one of two strategies: a bounded retry loop
//! with backoff, or a single attempt gated by a shared circuit breaker.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod transport;
pub mod upstream;

pub use config::ClientConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{CallError, CircuitBreaker, ResilientCall};

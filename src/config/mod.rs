//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + command-line overrides
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig (validated, immutable)
//!     → shared by value with the executor, breaker and server
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BackoffKind, CircuitBreakerConfig, ClientConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RetryConfig, Strategy, TimeoutConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};

//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request → ResilientCall::call(url)
//!
//! retry strategy (retries.rs):
//!     → timeouts.rs (per-call deadline, cancellation)
//!     → classify.rs (success / transient / permanent)
//!     → transient: backoff.rs delay, try again (bounded)
//!
//! circuit-breaker strategy (gated.rs):
//!     → circuit_breaker.rs (permission check, may admit the probe)
//!     → timeouts.rs → classify.rs
//!     → report success / failure back to circuit_breaker.rs
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - The two strategies are alternatives, selected by configuration
//! - One breaker instance per process, injected, never global
//! - Breaker time is read through an injectable `Clock`

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod clock;
pub mod executor;
pub mod gated;
pub mod retries;
pub mod timeouts;
pub mod types;

pub use backoff::BackoffSchedule;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerSnapshot, CircuitState, Permit};
pub use classify::{Classifier, DispatchFailures, Outcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use executor::{build_executor, ResilientCall};
pub use gated::BreakerExecutor;
pub use retries::{RetryContext, RetryExecutor};
pub use types::{CallError, CallResult};

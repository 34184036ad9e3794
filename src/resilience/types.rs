//! Error taxonomy for resilient upstream calls.

use thiserror::Error;

use crate::transport::TransportError;

/// Why a resilient call did not produce a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The request never completed (connect, timeout, transport). Never retried.
    #[error("request failed: {0}")]
    Dispatch(TransportError),

    /// Upstream answered with a status in the retryable set.
    #[error("status {0}")]
    RetryableStatus(u16),

    /// Upstream answered with a status outside the retryable set.
    #[error("unexpected status: {0}")]
    PermanentStatus(u16),

    /// A successful status whose payload could not be read.
    #[error("failed to read response: {0}")]
    BodyRead(String),

    /// Rejected by the circuit breaker without contacting upstream.
    #[error("circuit breaker blocked the request")]
    BreakerBlocked,

    /// Every attempt ended in a transient failure.
    #[error("after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<CallError> },

    /// The caller gave up before the call resolved.
    #[error("call cancelled")]
    Cancelled,
}

impl CallError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::Dispatch(_) => "dispatch",
            CallError::RetryableStatus(_) => "retryable_status",
            CallError::PermanentStatus(_) => "permanent_status",
            CallError::BodyRead(_) => "body_read",
            CallError::BreakerBlocked => "breaker_blocked",
            CallError::ExhaustedRetries { .. } => "exhausted_retries",
            CallError::Cancelled => "cancelled",
        }
    }
}

/// Result type for resilient calls.
pub type CallResult<T> = Result<T, CallError>;

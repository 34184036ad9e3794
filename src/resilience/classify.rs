//! Outcome classification.
//!
//! Maps a raw transport result to success, transient failure or permanent
//! failure. Connection-level failures are the one case whose treatment
//! depends on the calling strategy: the retry loop gives up on them at once,
//! while the breaker-gated path counts them against dependency health.

use crate::resilience::types::CallError;
use crate::transport::{TransportError, TransportResponse};

/// Classified result of a single upstream attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    TransientFailure(CallError),
    PermanentFailure(CallError),
}

/// How dispatch-level failures are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchFailures {
    /// Terminal, never retried.
    Permanent,
    /// Counted as a transient dependency failure.
    Transient,
}

/// Status-code based classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    retryable_statuses: Vec<u16>,
    dispatch_failures: DispatchFailures,
}

impl Classifier {
    pub fn new(retryable_statuses: Vec<u16>, dispatch_failures: DispatchFailures) -> Self {
        Self {
            retryable_statuses,
            dispatch_failures,
        }
    }

    /// True when `status` is in the configured retryable set.
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    pub fn classify(&self, result: Result<TransportResponse, TransportError>) -> Outcome {
        match result {
            Ok(response) if response.status == 200 => Outcome::Success(response.body),
            Ok(response) if self.is_retryable(response.status) => {
                Outcome::TransientFailure(CallError::RetryableStatus(response.status))
            }
            Ok(response) => Outcome::PermanentFailure(CallError::PermanentStatus(response.status)),
            Err(TransportError::Body(reason)) => Outcome::PermanentFailure(CallError::BodyRead(reason)),
            Err(e) => match self.dispatch_failures {
                DispatchFailures::Permanent => Outcome::PermanentFailure(CallError::Dispatch(e)),
                DispatchFailures::Transient => Outcome::TransientFailure(CallError::Dispatch(e)),
            },
        }
    }
}

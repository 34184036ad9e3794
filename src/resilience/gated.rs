//! Breaker-gated single attempt.
//!
//! # Responsibilities
//! - Ask the shared breaker for permission before every dispatch
//! - Dispatch at most once per call
//! - Report dispatch failures and retryable statuses as breaker failures,
//!   successes as breaker successes
//!
//! # Design Decisions
//! - No retry loop: the breaker's cooldown is the backoff. Retrying here
//!   would keep hammering an upstream the breaker is trying to shed load from
//! - A breaker rejection is never itself recorded as a failure, otherwise an
//!   open breaker would keep re-arming its own cooldown
//! - Non-retryable statuses and unreadable bodies leave the breaker untouched

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Strategy;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::classify::{Classifier, DispatchFailures, Outcome};
use crate::resilience::executor::ResilientCall;
use crate::resilience::timeouts;
use crate::resilience::types::{CallError, CallResult};
use crate::transport::Transport;

/// Single attempt gated by a shared circuit breaker.
pub struct BreakerExecutor {
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker>,
    classifier: Classifier,
    timeout: Duration,
}

impl BreakerExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        breaker: Arc<CircuitBreaker>,
        retryable_statuses: Vec<u16>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            breaker,
            classifier: Classifier::new(retryable_statuses, DispatchFailures::Transient),
            timeout,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl ResilientCall for BreakerExecutor {
    async fn call_with_cancel(&self, url: &str, cancel: &CancellationToken) -> CallResult<String> {
        let Some(permit) = self.breaker.try_acquire() else {
            return Err(CallError::BreakerBlocked);
        };
        if permit.is_probe() {
            tracing::info!(url = %url, "Sending probe request");
        }

        // Dropping an unresolved probe permit on cancellation hands the slot back.
        let result =
            timeouts::dispatch_with_deadline(self.transport.as_ref(), url, self.timeout, cancel).await?;

        match self.classifier.classify(result) {
            Outcome::Success(body) => {
                metrics::record_upstream_attempt("success");
                permit.success();
                Ok(body)
            }
            Outcome::TransientFailure(e) => {
                metrics::record_upstream_attempt("transient");
                tracing::warn!(error = %e, "Upstream call failed, recording breaker failure");
                permit.failure();
                Err(e)
            }
            Outcome::PermanentFailure(e) => {
                metrics::record_upstream_attempt("permanent");
                tracing::warn!(error = %e, "Upstream call failed");
                Err(e)
            }
        }
    }

    fn strategy(&self) -> Strategy {
        Strategy::CircuitBreaker
    }
}

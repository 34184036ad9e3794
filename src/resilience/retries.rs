//! Retry logic.
//!
//! # Responsibilities
//! - Loop up to `max_attempts` on transient upstream statuses
//! - Sleep per the backoff schedule before each retry
//! - Give up at once on dispatch failures and non-retryable statuses
//!
//! # Design Decisions
//! - No circuit breaker on this path
//! - Dispatch failures are never retried
//! - Exhaustion reports the attempt count and the last failure

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Strategy;
use crate::observability::metrics;
use crate::resilience::backoff::BackoffSchedule;
use crate::resilience::classify::{Classifier, DispatchFailures, Outcome};
use crate::resilience::executor::ResilientCall;
use crate::resilience::timeouts;
use crate::resilience::types::{CallError, CallResult};
use crate::transport::Transport;

/// Per-call retry bookkeeping. Lives for one logical request.
#[derive(Debug)]
pub struct RetryContext {
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<CallError>,
}

impl RetryContext {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            last_error: None,
        }
    }

    pub fn has_next(&self) -> bool {
        self.attempt + 1 < self.max_attempts
    }

    fn exhausted(self) -> CallError {
        CallError::ExhaustedRetries {
            attempts: self.max_attempts,
            last: Box::new(self.last_error.unwrap_or(CallError::Cancelled)),
        }
    }
}

/// Bounded retry with backoff, no breaker.
pub struct RetryExecutor {
    transport: Arc<dyn Transport>,
    max_attempts: u32,
    backoff: BackoffSchedule,
    classifier: Classifier,
    timeout: Duration,
}

impl RetryExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        max_attempts: u32,
        backoff: BackoffSchedule,
        retryable_statuses: Vec<u16>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            max_attempts: max_attempts.max(1),
            backoff,
            classifier: Classifier::new(retryable_statuses, DispatchFailures::Permanent),
            timeout,
        }
    }
}

#[async_trait]
impl ResilientCall for RetryExecutor {
    async fn call_with_cancel(&self, url: &str, cancel: &CancellationToken) -> CallResult<String> {
        let mut ctx = RetryContext::new(self.max_attempts);

        loop {
            let result =
                timeouts::dispatch_with_deadline(self.transport.as_ref(), url, self.timeout, cancel).await?;

            match self.classifier.classify(result) {
                Outcome::Success(body) => {
                    metrics::record_upstream_attempt("success");
                    return Ok(body);
                }
                Outcome::PermanentFailure(e) => {
                    metrics::record_upstream_attempt("permanent");
                    tracing::warn!(attempt = ctx.attempt, error = %e, "Upstream call failed, not retrying");
                    return Err(e);
                }
                Outcome::TransientFailure(e) => {
                    metrics::record_upstream_attempt("transient");
                    if !ctx.has_next() {
                        ctx.last_error = Some(e);
                        break;
                    }
                    ctx.attempt += 1;
                    let delay = self.backoff.delay_for(ctx.attempt);
                    tracing::info!(attempt = ctx.attempt, delay = ?delay, error = %e, "Retrying request");
                    ctx.last_error = Some(e);
                    metrics::record_retry();
                    timeouts::sleep(delay, cancel).await?;
                }
            }
        }

        let err = ctx.exhausted();
        tracing::warn!(error = %err, "Retries exhausted");
        Err(err)
    }

    fn strategy(&self) -> Strategy {
        Strategy::Retry
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transport::{TransportError, TransportResponse};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Replays a fixed sequence of results, recording when each dispatch happened.
    pub(crate) struct Scripted {
        script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
        pub(crate) calls: Mutex<Vec<Instant>>,
    }

    impl Scripted {
        pub(crate) fn new(script: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn statuses(statuses: &[u16]) -> Arc<Self> {
            Self::new(
                statuses
                    .iter()
                    .map(|&s| Ok(TransportResponse::new(s, format!("body {}", s))))
                    .collect(),
            )
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        /// Assert the waits between dispatches, allowing for timer rounding.
        pub(crate) fn assert_gaps(&self, expected: &[Duration]) {
            let calls = self.calls.lock().unwrap();
            let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
            assert_eq!(gaps.len(), expected.len(), "gaps: {:?}", gaps);
            for (gap, want) in gaps.iter().zip(expected) {
                assert!(
                    *gap >= *want && *gap < *want + Duration::from_millis(50),
                    "gap {:?}, expected {:?}",
                    gap,
                    want
                );
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn dispatch(&self, _url: &str) -> Result<TransportResponse, TransportError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Request("script exhausted".into())))
        }
    }

    fn executor(transport: Arc<Scripted>) -> RetryExecutor {
        RetryExecutor::new(
            transport,
            3,
            BackoffSchedule::Linear {
                unit: Duration::from_secs(1),
            },
            vec![500, 502, 503, 504],
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_two_transient_failures() {
        let transport = Scripted::statuses(&[503, 503, 200]);

        let body = executor(transport.clone()).call("http://upstream").await.unwrap();

        assert_eq!(body, "body 200");
        assert_eq!(transport.call_count(), 3);
        transport.assert_gaps(&[Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_max_attempts() {
        let transport = Scripted::statuses(&[500, 502, 504, 200]);

        let err = executor(transport.clone()).call("http://upstream").await.unwrap_err();

        assert_eq!(
            err,
            CallError::ExhaustedRetries {
                attempts: 3,
                last: Box::new(CallError::RetryableStatus(504)),
            }
        );
        assert_eq!(transport.call_count(), 3);
        transport.assert_gaps(&[Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_status_fails_after_one_attempt() {
        let transport = Scripted::statuses(&[404, 200]);

        let err = executor(transport.clone()).call("http://upstream").await.unwrap_err();

        assert_eq!(err, CallError::PermanentStatus(404));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_failure_is_not_retried() {
        let transport = Scripted::new(vec![
            Err(TransportError::Connect("refused".into())),
            Ok(TransportResponse::new(200, "late")),
        ]);

        let err = executor(transport.clone()).call("http://upstream").await.unwrap_err();

        assert!(matches!(err, CallError::Dispatch(TransportError::Connect(_))));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let transport = Scripted::statuses(&[503, 200]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = executor(transport.clone())
            .call_with_cancel("http://upstream", &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, CallError::Cancelled);
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_retry_context() {
        let mut ctx = RetryContext::new(3);
        assert!(ctx.has_next());
        ctx.attempt = 2;
        assert!(!ctx.has_next());
    }
}

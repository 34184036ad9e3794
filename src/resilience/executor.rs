//! Strategy selection.
//!
//! Both strategies are built from the same primitives and expose the same
//! shape: `call(url) -> payload or CallError`.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{ClientConfig, Strategy};
use crate::resilience::backoff::BackoffSchedule;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::gated::BreakerExecutor;
use crate::resilience::retries::RetryExecutor;
use crate::resilience::types::CallResult;
use crate::transport::Transport;

/// A fault-tolerant way of calling the upstream.
#[async_trait]
pub trait ResilientCall: Send + Sync {
    /// Call `url`, aborting promptly if `cancel` fires.
    async fn call_with_cancel(&self, url: &str, cancel: &CancellationToken) -> CallResult<String>;

    /// Call `url` with no caller-side cancellation.
    async fn call(&self, url: &str) -> CallResult<String> {
        self.call_with_cancel(url, &CancellationToken::new()).await
    }

    fn strategy(&self) -> Strategy;
}

/// Build the executor selected by `config.strategy`.
///
/// The breaker is only consulted by the `circuit-breaker` strategy, but it
/// is always passed in so a single instance lives for the whole process.
pub fn build_executor(
    config: &ClientConfig,
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker>,
) -> Arc<dyn ResilientCall> {
    let timeout = Duration::from_secs(config.timeouts.upstream_secs);
    let statuses = config.upstream.retryable_statuses.clone();

    match config.strategy {
        Strategy::Retry => Arc::new(RetryExecutor::new(
            transport,
            config.retries.max_attempts,
            BackoffSchedule::from_config(&config.retries),
            statuses,
            timeout,
        )),
        Strategy::CircuitBreaker => Arc::new(BreakerExecutor::new(transport, breaker, statuses, timeout)),
    }
}

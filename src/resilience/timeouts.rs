//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream dispatches with the per-call deadline
//! - Abort an in-flight dispatch or backoff sleep on cancellation
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - A timeout is a dispatch failure, a cancellation is `CallError::Cancelled`
//! - Backoff sleeps hold no shared state, so concurrent callers never wait on each other

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::resilience::types::{CallError, CallResult};
use crate::transport::{Transport, TransportError, TransportResponse};

/// Dispatch once, bounded by `timeout` and abortable through `cancel`.
///
/// The outer `Err` is only ever [`CallError::Cancelled`].
pub async fn dispatch_with_deadline(
    transport: &dyn Transport,
    url: &str,
    timeout: Duration,
    cancel: &CancellationToken,
) -> CallResult<Result<TransportResponse, TransportError>> {
    tokio::select! {
        _ = cancel.cancelled() => Err(CallError::Cancelled),
        result = tokio::time::timeout(timeout, transport.dispatch(url)) => Ok(match result {
            Ok(inner) => inner,
            Err(_) => Err(TransportError::Timeout(timeout.as_millis() as u64)),
        }),
    }
}

/// Sleep for `delay` unless cancelled first.
pub async fn sleep(delay: Duration, cancel: &CancellationToken) -> CallResult<()> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = cancel.cancelled() => Err(CallError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

//! Simulated upstream weather service.
//!
//! A flaky HTTP dependency for exercising the client. Which requests fail is
//! decided by an injected [`FailurePolicy`]: random in the `weather-service`
//! binary, scripted in tests.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

/// Decides the status of the next weather response. `None` means success.
pub trait FailurePolicy: Send + Sync {
    fn next_failure(&self) -> Option<StatusCode>;
}

impl<F> FailurePolicy for F
where
    F: Fn() -> Option<StatusCode> + Send + Sync,
{
    fn next_failure(&self) -> Option<StatusCode> {
        self()
    }
}

/// Fails a fixed fraction of requests with a random server error.
#[derive(Debug, Clone)]
pub struct RandomFailures {
    failure_ratio: f64,
    statuses: Vec<StatusCode>,
}

impl RandomFailures {
    pub const DEFAULT_RATIO: f64 = 0.5;

    /// Ratios outside `0.0..=1.0` are clamped. NaN and infinities fall back
    /// to [`DEFAULT_RATIO`](Self::DEFAULT_RATIO).
    pub fn new(failure_ratio: f64) -> Self {
        let failure_ratio = if failure_ratio.is_finite() {
            failure_ratio.clamp(0.0, 1.0)
        } else {
            Self::DEFAULT_RATIO
        };

        Self {
            failure_ratio,
            statuses: vec![
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ],
        }
    }
}

impl Default for RandomFailures {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RATIO)
    }
}

impl FailurePolicy for RandomFailures {
    fn next_failure(&self) -> Option<StatusCode> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.failure_ratio) {
            self.statuses.choose(&mut rng).copied()
        } else {
            None
        }
    }
}

/// Router serving `GET /weather`.
pub fn weather_router(policy: Arc<dyn FailurePolicy>) -> Router {
    Router::new()
        .route("/weather", get(weather_handler))
        .with_state(policy)
}

async fn weather_handler(State(policy): State<Arc<dyn FailurePolicy>>) -> Response {
    match policy.next_failure() {
        Some(status) => {
            tracing::debug!(status = %status, "Injecting failure");
            (status, "Internal Server Error").into_response()
        }
        None => Json(serde_json::json!({ "city": "Moscow", "value": 22 })).into_response(),
    }
}

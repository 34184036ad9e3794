//! Mapping call results to HTTP responses.
//!
//! The wrapping server is the only place errors become user-visible:
//! a breaker rejection is 503, every other failure is 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::resilience::CallError;

/// Status code the wrapper answers with for a failed call.
pub fn status_for(err: &CallError) -> StatusCode {
    match err {
        CallError::BreakerBlocked => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for CallError {
    fn into_response(self) -> Response {
        (status_for(&self), self.to_string()).into_response()
    }
}

/// Successful response body.
pub fn weather_body(payload: &str) -> String {
    format!("Weather data: {}", payload.trim_end())
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, timeouts > 0)
//! - Check the upstream URL and listener addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{BackoffKind, ClientConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be at least {min}")]
    TooSmall { field: &'static str, min: u64 },

    #[error("invalid upstream url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("retryable status {0} is not a valid error status")]
    InvalidStatus(u16),

    #[error("invalid {field} address '{address}'")]
    InvalidAddress { field: &'static str, address: String },

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    DelayRange { base: u64, max: u64 },
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let minimums: [(&'static str, u64, u64); 5] = [
        ("retries.max_attempts", config.retries.max_attempts as u64, 1),
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold as u64, 1),
        ("circuit_breaker.reset_timeout_secs", config.circuit_breaker.reset_timeout_secs, 1),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs, 1),
        ("timeouts.request_secs", config.timeouts.request_secs, 1),
    ];
    for (field, value, min) in minimums {
        if value < min {
            errors.push(ValidationError::TooSmall { field, min });
        }
    }

    match Url::parse(&config.upstream.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::InvalidUrl {
            url: config.upstream.url.clone(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => errors.push(ValidationError::InvalidUrl {
            url: config.upstream.url.clone(),
            reason: e.to_string(),
        }),
    }

    for &status in &config.upstream.retryable_statuses {
        if !(100..=599).contains(&status) || (200..300).contains(&status) {
            errors.push(ValidationError::InvalidStatus(status));
        }
    }

    if config.retries.backoff == BackoffKind::Exponential
        && config.retries.base_delay_ms > config.retries.max_delay_ms
    {
        errors.push(ValidationError::DelayRange {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            address: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            address: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Gateway error taxonomy.
//!
//! Lower layers keep their own error types ([`UpstreamError`],
//! [`CacheError`], [`TransformError`]); `From` impls here classify them
//! into the kinds callers see. Each kind maps to one HTTP status through
//! [`GatewayError::status_code`].

use std::time::Duration;
use thiserror::Error;

use crate::cache::CacheError;
use crate::resource::Resource;
use crate::transform::TransformError;
use crate::upstream::UpstreamError;

/// Retry hint when the upstream failed every attempt (breaker may still be closed)
pub const EXHAUSTED_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed or out-of-range request parameters
    #[error("invalid request: {message}")]
    Validation {
        message: String,
        field: Option<&'static str>,
    },

    #[error("{resource} '{id}' not found")]
    NotFound { resource: String, id: String },

    /// Non-transient upstream answer, passed through
    #[error("upstream responded {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Breaker open or retries exhausted
    #[error("service temporarily unavailable: {reason}")]
    ServiceUnavailable { reason: String, retry_after: Duration },

    /// Never the primary failure of a request; surfaced only by explicit
    /// cache management calls
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("internal error: {message}")]
    Internal {
        message: String,
        details: Option<String>,
    },

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
}

impl GatewayError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field),
        }
    }

    pub fn not_found(resource: Resource, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.as_str().to_string(),
            id: id.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            details: None,
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Upstream { .. } => "UPSTREAM_ERROR",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::RateLimited { .. } => "RATE_LIMITED",
        }
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Upstream { status, .. } if (400..600).contains(status) => *status,
            Self::Upstream { .. } => 502,
            Self::ServiceUnavailable { .. } => 503,
            Self::Cache(_) | Self::Internal { .. } => 500,
            Self::RateLimited { .. } => 429,
        }
    }

    /// Retry hint for 503 and 429 responses
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ServiceUnavailable { retry_after, .. } | Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

/// `/users/3` → ("customers", "3"); unknown paths keep the path as id
fn not_found_target(path: &str) -> (String, String) {
    let resource = Resource::from_legacy_path(path)
        .map(|r| r.as_str().to_string())
        .unwrap_or_else(|| "record".to_string());
    let id = path
        .split('?')
        .next()
        .and_then(|p| p.rsplit('/').next())
        .filter(|s| !s.is_empty())
        .unwrap_or(path)
        .to_string();
    (resource, id)
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::NotFound { path } => {
                let (resource, id) = not_found_target(&path);
                Self::NotFound { resource, id }
            }
            UpstreamError::Status { status, body, .. } if status < 500 => Self::Upstream {
                status,
                message: if body.is_empty() { format!("HTTP {}", status) } else { body },
            },
            UpstreamError::CircuitOpen { circuit, retry_after } => Self::ServiceUnavailable {
                reason: format!("upstream circuit '{}' is open", circuit),
                retry_after,
            },
            UpstreamError::Exhausted { attempts, last, .. } => {
                let last = *last;
                match last {
                    // Permanent answers end the loop early, so this only wraps transients
                    UpstreamError::NotFound { .. } | UpstreamError::Status { status: 400..=499, .. } => {
                        Self::from(last)
                    }
                    last => Self::ServiceUnavailable {
                        reason: format!("upstream failed after {} attempts ({})", attempts, last.kind()),
                        retry_after: EXHAUSTED_RETRY_AFTER,
                    },
                }
            }
            // A single transient failure that was not retried (policy of one attempt)
            other => Self::ServiceUnavailable {
                reason: format!("upstream {}", other.kind()),
                retry_after: EXHAUSTED_RETRY_AFTER,
            },
        }
    }
}

impl From<TransformError> for GatewayError {
    fn from(err: TransformError) -> Self {
        Self::Internal {
            message: "failed to transform upstream record".to_string(),
            details: Some(err.to_string()),
        }
    }
}

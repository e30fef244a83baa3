//! Upstream failure taxonomy.

use std::time::Duration;
use thiserror::Error;

use crate::resilience::circuit_breaker::{Rejected, TripsBreaker};
use crate::resilience::retry::Retryable;

#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    #[error("upstream call to {path} timed out after {after:?}")]
    Timeout { path: String, after: Duration },

    /// Connection refused, reset, DNS, TLS
    #[error("transport error calling {path}: {message}")]
    Transport { path: String, message: String },

    #[error("upstream returned HTTP {status} for {path}")]
    Status { path: String, status: u16, body: String },

    #[error("upstream has no record at {path}")]
    NotFound { path: String },

    /// A 2xx body that does not match the expected shape
    #[error("cannot decode response from {path}: {message}")]
    Decode { path: String, message: String },

    #[error("circuit '{circuit}' open, retry after {retry_after:?}")]
    CircuitOpen { circuit: String, retry_after: Duration },

    #[error("gave up after {attempts} attempts in {elapsed:?}: {last}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    /// Short label for logs and the `outcome` metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "transport",
            Self::Status { status, .. } if *status >= 500 => "server_error",
            Self::Status { .. } => "client_error",
            Self::NotFound { .. } => "not_found",
            Self::Decode { .. } => "decode",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Exhausted { .. } => "exhausted",
        }
    }

    /// The error that caused the final attempt to fail.
    #[must_use]
    pub fn root(&self) -> &UpstreamError {
        match self {
            Self::Exhausted { last, .. } => last.root(),
            other => other,
        }
    }

    /// Whether this reflects a transient upstream condition.
    fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } | Self::Decode { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::NotFound { .. } | Self::CircuitOpen { .. } | Self::Exhausted { .. } => false,
        }
    }
}

impl From<Rejected> for UpstreamError {
    fn from(r: Rejected) -> Self {
        Self::CircuitOpen {
            circuit: r.circuit,
            retry_after: r.retry_after,
        }
    }
}

impl Retryable for UpstreamError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

impl TripsBreaker for UpstreamError {
    fn trips_breaker(&self) -> bool {
        self.is_transient()
    }
}

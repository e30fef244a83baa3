// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Response envelopes returned at the gateway boundary.
//!
//! ```json
//! {
//!   "success": true,
//!   "data": { ... },
//!   "metadata": { "timestamp": "...", "version": "v2", "cached": false, "processingTimeMs": 14 }
//! }
//! ```
//!
//! Failures use the same outer shape with `success: false` and an `error`
//! block instead of `data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    pub version: String,
    /// True only when the payload came from the cache store
    pub cached: bool,
    pub processing_time_ms: u64,
}

impl ResponseMetadata {
    #[must_use]
    pub fn new(version: &str, cached: bool, elapsed: Duration) -> Self {
        Self {
            timestamp: Utc::now(),
            version: version.to_string(),
            cached,
            processing_time_ms: elapsed.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Whole seconds, rounded up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// Internal detail; omitted in production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    #[must_use]
    pub fn from_error(err: &GatewayError, production: bool) -> Self {
        let (message, details) = match err {
            GatewayError::Internal { message, .. } if production => (message.clone(), None),
            GatewayError::Internal { message, details } => (message.clone(), details.clone()),
            other => (other.to_string(), None),
        };
        let field = match err {
            GatewayError::Validation { field, .. } => (*field).map(String::from),
            _ => None,
        };

        Self {
            code: err.code().to_string(),
            message,
            status_code: err.status_code(),
            field,
            retry_after: err.retry_after().map(ceil_secs),
            details,
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    secs.max(1)
}

/// Single-payload envelope (`data` on success, `error` on failure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub metadata: ResponseMetadata,
}

impl<T> ResponseEnvelope<T> {
    #[must_use]
    pub fn ok(data: T, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    #[must_use]
    pub fn failure(err: &GatewayError, production: bool, metadata: ResponseMetadata) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody::from_error(err, production)),
            metadata,
        }
    }
}

/// Envelope for errors with no payload type.
pub type ErrorEnvelope = ResponseEnvelope<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    /// Items after filtering, before slicing
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedEnvelope<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub pagination: Pagination,
    pub metadata: ResponseMetadata,
}

impl<T> PaginatedEnvelope<T> {
    #[must_use]
    pub fn ok(data: Vec<T>, pagination: Pagination, metadata: ResponseMetadata) -> Self {
        Self {
            success: true,
            data,
            pagination,
            metadata,
        }
    }
}

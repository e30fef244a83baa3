// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the gateway.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host process is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `legacy_gateway_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `tier`: L1, L2
//! - `resource`: customers, payments
//! - `operation`: list_customers, get_payment, ...
//! - `outcome` / `status`: success, error, rejected, hit, miss

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

// ═══════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════

/// Record a cache lookup outcome ("hit" / "miss")
pub fn record_cache(tier: &str, outcome: &str) {
    counter!(
        "legacy_gateway_cache_lookups_total",
        "tier" => tier.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a swallowed cache backend error
pub fn record_cache_error(tier: &str, operation: &str) {
    counter!(
        "legacy_gateway_cache_errors_total",
        "tier" => tier.to_string(),
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Set current L1 entry count
pub fn set_cache_entries(count: usize) {
    gauge!("legacy_gateway_l1_cache_entries").set(count as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// UPSTREAM
// ═══════════════════════════════════════════════════════════════════════════

/// Record one upstream attempt and how it ended
pub fn record_upstream_attempt(resource: &str, outcome: &str) {
    counter!(
        "legacy_gateway_upstream_attempts_total",
        "resource" => resource.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record upstream attempt latency
pub fn record_upstream_latency(resource: &str, duration: Duration) {
    histogram!(
        "legacy_gateway_upstream_seconds",
        "resource" => resource.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a retry being scheduled
pub fn record_retry(operation: &str) {
    counter!(
        "legacy_gateway_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// CIRCUIT BREAKER
// ═══════════════════════════════════════════════════════════════════════════

/// Record circuit breaker state change (0 = closed, 1 = half-open, 2 = open)
pub fn set_circuit_state(circuit: &str, state: u8) {
    gauge!(
        "legacy_gateway_circuit_breaker_state",
        "circuit" => circuit.to_string()
    )
    .set(state as f64);
}

/// Record circuit breaker call outcome
pub fn record_circuit_call(circuit: &str, outcome: &str) {
    counter!(
        "legacy_gateway_circuit_breaker_calls_total",
        "circuit" => circuit.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// REQUESTS
// ═══════════════════════════════════════════════════════════════════════════

/// Record a façade request outcome
pub fn record_request(operation: &str, status: &str) {
    counter!(
        "legacy_gateway_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record façade request latency
pub fn record_latency(operation: &str, duration: Duration) {
    histogram!(
        "legacy_gateway_request_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a caller being rate limited
pub fn record_rate_limited() {
    counter!("legacy_gateway_rate_limited_total").increment(1);
}

/// Set gateway lifecycle state
pub fn set_gateway_state(state: &str) {
    counter!(
        "legacy_gateway_state_transitions_total",
        "state" => state.to_string()
    )
    .increment(1);
}

/// A timing guard that records latency on drop
pub struct LatencyTimer {
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    /// Start a new latency timer
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.operation, self.start.elapsed());
    }
}

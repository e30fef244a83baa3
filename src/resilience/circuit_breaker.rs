// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Circuit breaker guarding calls to the legacy service.
//!
//! States:
//! - Closed: Normal operation, requests pass through
//! - Open: Upstream unhealthy, requests fail-fast without attempting
//! - HalfOpen: Cool-down elapsed, exactly one probe request is admitted
//!
//! ```text
//!            failures >= threshold                cooldown elapsed
//!   Closed ───────────────────────▶ Open ─────────────────────────▶ HalfOpen
//!     ▲                              ▲                                  │
//!     │        probe succeeded       │          probe failed            │
//!     └──────────────────────────────┼──────────────────────────────────┤
//!                                    └──────────────────────────────────┘
//! ```
//!
//! All transitions happen under one mutex, so concurrent failures never
//! count past the threshold and only one half-open probe is in flight.
//! A permit dropped without an outcome (caller cancelled) counts as neither
//! success nor failure; a dropped probe frees the probe slot.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::resource::Resource;

/// Circuit breaker state for metrics/monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    HalfOpen = 1,
    Open = 2,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::HalfOpen => write!(f, "half_open"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// How breakers are shared between resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerScope {
    /// One breaker per [`Resource`]
    #[default]
    PerResource,
    /// One breaker for the whole upstream host
    Global,
}

impl FromStr for BreakerScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per_resource" | "per-resource" | "resource" => Ok(Self::PerResource),
            "global" => Ok(Self::Global),
            other => Err(format!("unknown breaker scope '{}'", other)),
        }
    }
}

/// Configuration for a circuit breaker
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures within `failure_window` that trip the circuit
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe
    pub cooldown: Duration,
    /// A failure older than this no longer counts toward the threshold
    pub failure_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    /// Fast recovery for testing
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            failure_threshold: 2,
            cooldown: Duration::from_millis(50),
            failure_window: Duration::from_secs(60),
        }
    }
}

/// The call was refused without reaching the upstream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("circuit breaker '{circuit}' open, request rejected (retry after {retry_after:?})")]
pub struct Rejected {
    pub circuit: String,
    pub retry_after: Duration,
}

/// Whether an operation error is evidence of an unhealthy upstream.
pub trait TripsBreaker {
    fn trips_breaker(&self) -> bool;
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for BreakerInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_at: None,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    /// Milliseconds since the last recorded failure
    pub last_failure_ms_ago: Option<u64>,
    pub calls_total: u64,
    pub rejections: u64,
}

/// A named circuit breaker with metrics tracking
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,

    // Metrics
    calls_total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and config
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::default()),
            calls_total: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. An open circuit whose cool-down has elapsed reports
    /// `HalfOpen` even before the next call performs the transition.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened)) if opened.elapsed() >= self.config.cooldown => {
                CircuitState::HalfOpen
            }
            (state, _) => state,
        }
    }

    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    /// Ask for permission to call the upstream.
    pub fn try_acquire(&self) -> Result<BreakerPermit<'_>, Rejected> {
        self.calls_total.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();

        if inner.state == CircuitState::Open {
            let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
            if elapsed < self.config.cooldown {
                drop(inner);
                return Err(self.reject(self.config.cooldown - elapsed));
            }
            inner.state = CircuitState::HalfOpen;
            info!(circuit = %self.name, "Circuit breaker transitioning to half-open");
            crate::metrics::set_circuit_state(&self.name, CircuitState::HalfOpen as u8);
        }

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(BreakerPermit::new(self, false)),
            CircuitState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                debug!(circuit = %self.name, "Admitting half-open probe");
                Ok(BreakerPermit::new(self, true))
            }
            _ => {
                drop(inner);
                // Another caller owns the probe; treat as open
                Err(self.reject(Duration::ZERO))
            }
        }
    }

    fn reject(&self, retry_after: Duration) -> Rejected {
        self.rejections.fetch_add(1, Ordering::Relaxed);
        warn!(circuit = %self.name, ?retry_after, "Circuit breaker rejected call (open)");
        crate::metrics::record_circuit_call(&self.name, "rejected");
        Rejected {
            circuit: self.name.clone(),
            retry_after,
        }
    }

    fn on_success(&self, probe: bool) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_circuit_call(&self.name, "success");
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::HalfOpen if probe => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
                info!(circuit = %self.name, "Probe succeeded, circuit closed");
                crate::metrics::set_circuit_state(&self.name, CircuitState::Closed as u8);
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            // Late result from a call admitted before the circuit opened
            _ => {}
        }
    }

    fn on_failure(&self, probe: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_circuit_call(&self.name, "failure");
        let now = Instant::now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::HalfOpen if probe => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.last_failure_at = Some(now);
                inner.probe_in_flight = false;
                warn!(circuit = %self.name, "Probe failed, circuit re-opened");
                crate::metrics::set_circuit_state(&self.name, CircuitState::Open as u8);
            }
            CircuitState::Closed => {
                let stale = inner
                    .last_failure_at
                    .is_some_and(|t| now.duration_since(t) > self.config.failure_window);
                if stale {
                    inner.failure_count = 0;
                }
                inner.failure_count += 1;
                inner.last_failure_at = Some(now);

                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    warn!(
                        circuit = %self.name,
                        failures = inner.failure_count,
                        "Failure threshold reached, circuit opened"
                    );
                    crate::metrics::set_circuit_state(&self.name, CircuitState::Open as u8);
                }
            }
            // Already open: record the time, never count past the threshold
            _ => {
                inner.last_failure_at = Some(now);
            }
        }
    }

    fn on_cancel(&self, probe: bool) {
        if probe {
            let mut inner = self.inner.lock();
            inner.probe_in_flight = false;
            debug!(circuit = %self.name, "Probe cancelled, slot released");
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let (failure_count, last_failure_ms_ago) = {
            let inner = self.inner.lock();
            (
                inner.failure_count,
                inner.last_failure_at.map(|t| t.elapsed().as_millis() as u64),
            )
        };
        BreakerSnapshot {
            name: self.name.clone(),
            state: self.state(),
            failure_count,
            last_failure_ms_ago,
            calls_total: self.calls_total(),
            rejections: self.rejections(),
        }
    }

    #[must_use]
    pub fn calls_total(&self) -> u64 {
        self.calls_total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }
}

/// Admission ticket for one upstream call.
///
/// Resolve with [`success`](Self::success) or [`failure`](Self::failure).
/// Dropping it unresolved is treated as a cancellation.
#[must_use = "resolve the permit with success() or failure()"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    resolved: bool,
}

impl<'a> BreakerPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            resolved: false,
        }
    }

    /// Whether this permit is the half-open probe
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.on_success(self.probe);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.on_failure(self.probe);
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.on_cancel(self.probe);
        }
    }
}

/// Circuit breakers for every resource, shared or split per [`BreakerScope`].
pub struct BreakerRegistry {
    scope: BreakerScope,
    breakers: HashMap<Resource, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: BreakerConfig, scope: BreakerScope) -> Self {
        let breakers = match scope {
            BreakerScope::PerResource => Resource::ALL
                .iter()
                .map(|r| (*r, Arc::new(CircuitBreaker::new(r.as_str(), config.clone()))))
                .collect(),
            BreakerScope::Global => {
                let shared = Arc::new(CircuitBreaker::new("legacy_api", config));
                Resource::ALL.iter().map(|r| (*r, shared.clone())).collect()
            }
        };
        Self { scope, breakers }
    }

    #[must_use]
    pub fn scope(&self) -> BreakerScope {
        self.scope
    }

    /// Breaker guarding `resource`
    #[must_use]
    pub fn for_resource(&self, resource: Resource) -> &Arc<CircuitBreaker> {
        // Every Resource variant is inserted in new()
        &self.breakers[&resource]
    }

    /// Snapshot of each distinct breaker
    #[must_use]
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        match self.scope {
            BreakerScope::Global => vec![self.for_resource(Resource::Customers).snapshot()],
            BreakerScope::PerResource => Resource::ALL
                .iter()
                .map(|r| self.for_resource(*r).snapshot())
                .collect(),
        }
    }
}

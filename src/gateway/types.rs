//! Public types for the gateway façade.

use serde::Serialize;

use super::pagination::{DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitState};

/// Gateway lifecycle state.
///
/// ```text
/// Created → Ready → ShuttingDown → Stopped
/// ```
///
/// Requests are served in `Created` and `Ready`, and refused once shutdown
/// begins (`ShuttingDown`, `Stopped`); `init()` only adds the L2 tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GatewayState {
    /// Constructed, L2 tier not yet connected
    Created,
    Ready,
    ShuttingDown,
    Stopped,
}

impl GatewayState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Ready => "Ready",
            Self::ShuttingDown => "ShuttingDown",
            Self::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for `list_customers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerQuery {
    pub page: usize,
    pub limit: usize,
    /// Case-insensitive exact match on `address.city`
    pub city: Option<String>,
    pub use_cache: bool,
}

impl Default for CustomerQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            city: None,
            use_cache: true,
        }
    }
}

/// Parameters for `list_payments`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentQuery {
    pub page: usize,
    pub limit: usize,
    /// "completed", "pending" or "failed", any case
    pub status: Option<String>,
    pub customer_id: Option<u64>,
    pub use_cache: bool,
}

impl Default for PaymentQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            status: None,
            customer_id: None,
            use_cache: true,
        }
    }
}

/// Health snapshot from [`super::Gateway::health()`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub state: GatewayState,
    /// No breaker open and not stopped
    pub healthy: bool,
    pub breakers: Vec<BreakerSnapshot>,
    pub l1_entries: usize,
    pub l2_attached: bool,
    pub rate_limited_callers: usize,
}

impl HealthReport {
    /// Breakers not currently closed
    #[must_use]
    pub fn degraded_circuits(&self) -> Vec<&str> {
        self.breakers
            .iter()
            .filter(|b| b.state != CircuitState::Closed)
            .map(|b| b.name.as_str())
            .collect()
    }
}

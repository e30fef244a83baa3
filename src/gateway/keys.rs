//! Canonical cache keys.
//!
//! `"<op>:<k1=v1&k2=v2>"` with parameters sorted by name and `None`
//! values left out, so identical parameter sets always share a key:
//!
//! ```
//! use legacy_gateway::gateway::keys::CacheKey;
//!
//! let a = CacheKey::new("payments:list").param("status", "pending").opt("customerId", None::<u64>).build();
//! let b = CacheKey::new("payments:list").opt("customerId", None::<u64>).param("status", "pending").build();
//! assert_eq!(a, b);
//! assert_eq!(a, "payments:list:status=pending");
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;

/// Operation names, each scoped under its resource prefix
pub mod ops {
    pub const CUSTOMERS_LIST: &str = "customers:list";
    pub const CUSTOMERS_GET: &str = "customers:get";
    pub const CUSTOMERS_ENRICHED: &str = "customers:enriched";
    pub const PAYMENTS_LIST: &str = "payments:list";
    pub const PAYMENTS_GET: &str = "payments:get";
    pub const PAYMENTS_STATS: &str = "payments:stats";
}

#[derive(Debug, Clone)]
pub struct CacheKey {
    operation: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    #[must_use]
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn param(mut self, name: &str, value: impl Display) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn opt<V: Display>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    #[must_use]
    pub fn build(&self) -> String {
        if self.params.is_empty() {
            return self.operation.clone();
        }
        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}:{}", self.operation, query)
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Logical resource types exposed by the gateway.

use serde::Serialize;

/// A resource family served by the gateway.
///
/// Each resource maps to one legacy endpoint family and, under
/// [`BreakerScope::PerResource`](crate::BreakerScope::PerResource), owns its
/// own circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    Customers,
    Payments,
}

impl Resource {
    pub const ALL: [Resource; 2] = [Resource::Customers, Resource::Payments];

    /// Name used for cache keys, breaker names and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Payments => "payments",
        }
    }

    /// Legacy collection path backing this resource.
    #[must_use]
    pub fn legacy_path(&self) -> &'static str {
        match self {
            Self::Customers => "/users",
            Self::Payments => "/posts",
        }
    }

    /// Resource owning a legacy path such as `/users/3` or `/posts?userId=1`.
    #[must_use]
    pub fn from_legacy_path(path: &str) -> Option<Resource> {
        Self::ALL.into_iter().find(|r| {
            path.strip_prefix(r.legacy_path())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
        })
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache store: TTL-aware JSON key/value tiers.
//!
//! - [`memory::MemoryCache`]: L1, DashMap, always present
//! - [`redis::RedisCache`]: L2, optional, survives restarts
//! - [`tiered::TieredCache`]: read-through L1 → L2, write to both

pub mod memory;
pub mod redis;
pub mod tiered;
pub mod traits;

pub use memory::MemoryCache;
pub use tiered::TieredCache;
pub use traits::{CacheBackend, CacheBackendExt, CacheError, MAX_TTL};

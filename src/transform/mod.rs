// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Legacy → modern record transformation.
//!
//! - [`legacy`]: upstream JSON shapes, read-only
//! - [`model`]: modern response shapes
//! - [`pipeline`]: pure transform, stats and enrichment functions

pub mod fixtures;
pub mod legacy;
pub mod model;
pub mod pipeline;

pub use legacy::{LegacyPost, LegacyUser};
pub use model::{Customer, EnrichedCustomer, Payment, PaymentHistory, PaymentStats, PaymentStatus};
pub use pipeline::{compute_stats, enrich, transform_collection, Transform, TransformError};

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Upstream client: retry, circuit breaking and timeouts around the
//! legacy REST service.

pub mod client;
pub mod error;
pub mod transport;

pub use client::UpstreamClient;
pub use error::UpstreamError;
pub use transport::{HttpTransport, UpstreamTransport};

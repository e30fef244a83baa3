//! # Legacy Gateway
//!
//! A resilience and transformation gateway in front of a slow, unreliable
//! legacy REST service.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Gateway Façade                         │
//! │  • One operation per resource (list, get, enriched, stats) │
//! │  • Canonical cache keys, filtering, pagination             │
//! │  • Response envelopes + error taxonomy                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Cache Store                           │
//! │  • L1: DashMap with per-entry TTL                          │
//! │  • L2: Redis (optional, best-effort)                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ miss
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Upstream Client                         │
//! │  • Circuit breaker per resource (or global)                │
//! │  • Exponential / linear retry                              │
//! │  • Per-attempt timeout                                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Transformation Pipeline                      │
//! │  • Legacy users → customers, posts → payments              │
//! │  • Stats and customer/payment enrichment                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use legacy_gateway::{Gateway, GatewayConfig};
//! use legacy_gateway::gateway::PaymentQuery;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = GatewayConfig::from_env().expect("invalid configuration");
//!     let gateway = Gateway::from_config(config);
//!     gateway.init().await.expect("init failed");
//!
//!     let pending = gateway
//!         .list_payments(PaymentQuery {
//!             status: Some("pending".into()),
//!             ..Default::default()
//!         })
//!         .await
//!         .expect("request failed");
//!     println!("{} pending payments", pending.pagination.total);
//!
//!     gateway.shutdown().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`gateway`]: The [`Gateway`] façade coordinating every component
//! - [`cache`]: Cache store tiers (memory, Redis, tiered)
//! - [`upstream`]: HTTP transport and the resilient client
//! - [`resilience`]: Circuit breakers, retry, rate limiting
//! - [`transform`]: Legacy/modern record shapes and pure transforms
//! - [`envelope`] / [`error`]: Response contract and error taxonomy

pub mod cache;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod metrics;
pub mod resilience;
pub mod resource;
pub mod transform;
pub mod upstream;

pub use cache::{CacheBackend, CacheBackendExt, CacheError, MemoryCache, TieredCache};
pub use config::{ConfigError, GatewayConfig};
pub use envelope::{ErrorBody, ErrorEnvelope, PaginatedEnvelope, Pagination, ResponseEnvelope, ResponseMetadata};
pub use error::GatewayError;
pub use gateway::{Gateway, GatewayState, HealthReport};
pub use metrics::LatencyTimer;
pub use resilience::circuit_breaker::{BreakerConfig, BreakerRegistry, BreakerScope, CircuitBreaker, CircuitState};
pub use resilience::rate_limit::RateLimiter;
pub use resilience::retry::{BackoffStrategy, RetryPolicy};
pub use resource::Resource;
pub use upstream::{HttpTransport, UpstreamClient, UpstreamError, UpstreamTransport};

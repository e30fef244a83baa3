//! Façade operations: customers and payments.
//!
//! List operations cache the full transformed collection under the bare
//! operation key, then filter and paginate, so every page and filter
//! combination shares one upstream fetch. Single-record, enriched and stats
//! operations cache their final payload.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cache::CacheBackendExt;
use crate::envelope::{PaginatedEnvelope, ResponseEnvelope, ResponseMetadata};
use crate::error::GatewayError;
use crate::metrics::LatencyTimer;
use crate::transform::{
    compute_stats, enrich, transform_collection, Customer, EnrichedCustomer, Payment, PaymentStats, PaymentStatus,
    Transform,
};

use super::keys::{ops, CacheKey};
use super::pagination::{paginate, validate};
use super::{CustomerQuery, Gateway, PaymentQuery};

/// Positive numeric id from a caller-supplied string
fn parse_id(raw: &str) -> Result<u64, GatewayError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(GatewayError::validation("id", "id is required"));
    }
    match raw.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(GatewayError::validation("id", format!("id must be a positive integer, got '{}'", raw))),
    }
}

impl Gateway {
    // ═══════════════════════════════════════════════════════════════════════════
    // Customers
    // ═══════════════════════════════════════════════════════════════════════════

    #[tracing::instrument(skip(self))]
    pub async fn list_customers(&self, query: CustomerQuery) -> Result<PaginatedEnvelope<Customer>, GatewayError> {
        self.observe("list_customers", async {
            let started = Instant::now();
            self.ensure_serving()?;
            validate(query.page, query.limit)?;

            let key = CacheKey::new(ops::CUSTOMERS_LIST).build();
            let (customers, cached) = self
                .load(&key, query.use_cache, || async {
                    let raw = self.upstream.fetch_users().await?;
                    Ok::<_, GatewayError>(transform_collection(&raw)?)
                })
                .await?;

            let filtered: Vec<Customer> = match query.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
                Some(city) => customers
                    .into_iter()
                    .filter(|c| c.address.city.eq_ignore_ascii_case(city))
                    .collect(),
                None => customers,
            };

            let (page, pagination) = paginate(&filtered, query.page, query.limit);
            Ok(PaginatedEnvelope::ok(page, pagination, self.metadata(cached, started)))
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_customer(&self, id: &str, use_cache: bool) -> Result<ResponseEnvelope<Customer>, GatewayError> {
        self.observe("get_customer", async {
            let started = Instant::now();
            self.ensure_serving()?;
            let id = parse_id(id)?;

            let key = CacheKey::new(ops::CUSTOMERS_GET).param("id", id).build();
            let (customer, cached) = self
                .load(&key, use_cache, || async {
                    let raw = self.upstream.fetch_user(id).await?;
                    Ok::<_, GatewayError>(raw.transform()?)
                })
                .await?;

            Ok(ResponseEnvelope::ok(customer, self.metadata(cached, started)))
        })
        .await
    }

    /// Customer joined with its payment history.
    #[tracing::instrument(skip(self))]
    pub async fn get_customer_with_payments(
        &self,
        id: &str,
        use_cache: bool,
    ) -> Result<ResponseEnvelope<EnrichedCustomer>, GatewayError> {
        self.observe("get_customer_with_payments", async {
            let started = Instant::now();
            self.ensure_serving()?;
            let id = parse_id(id)?;

            let key = CacheKey::new(ops::CUSTOMERS_ENRICHED).param("id", id).build();
            let (enriched, cached) = self
                .load(&key, use_cache, || async {
                    // User first, so a missing customer is a 404 and never an empty history
                    let user = self.upstream.fetch_user(id).await?;
                    let posts = self.upstream.fetch_posts_for_user(id).await?;
                    let customer = user.transform()?;
                    let payments = transform_collection(&posts)?;
                    Ok::<_, GatewayError>(enrich(customer, &payments))
                })
                .await?;

            Ok(ResponseEnvelope::ok(enriched, self.metadata(cached, started)))
        })
        .await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Payments
    // ═══════════════════════════════════════════════════════════════════════════

    #[tracing::instrument(skip(self))]
    pub async fn list_payments(&self, query: PaymentQuery) -> Result<PaginatedEnvelope<Payment>, GatewayError> {
        self.observe("list_payments", async {
            let started = Instant::now();
            self.ensure_serving()?;
            validate(query.page, query.limit)?;

            let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(raw) => Some(
                    raw.parse::<PaymentStatus>()
                        .map_err(|msg| GatewayError::validation("status", msg))?,
                ),
                None => None,
            };

            let (payments, cached) = self.payments_collection(query.use_cache).await?;

            let filtered: Vec<Payment> = payments
                .into_iter()
                .filter(|p| status.map_or(true, |s| p.status == s))
                .filter(|p| query.customer_id.map_or(true, |c| p.customer_id == c))
                .collect();

            let (page, pagination) = paginate(&filtered, query.page, query.limit);
            Ok(PaginatedEnvelope::ok(page, pagination, self.metadata(cached, started)))
        })
        .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_payment(&self, id: &str, use_cache: bool) -> Result<ResponseEnvelope<Payment>, GatewayError> {
        self.observe("get_payment", async {
            let started = Instant::now();
            self.ensure_serving()?;
            let id = parse_id(id)?;

            let key = CacheKey::new(ops::PAYMENTS_GET).param("id", id).build();
            let (payment, cached) = self
                .load(&key, use_cache, || async {
                    let raw = self.upstream.fetch_post(id).await?;
                    Ok::<_, GatewayError>(raw.transform()?)
                })
                .await?;

            Ok(ResponseEnvelope::ok(payment, self.metadata(cached, started)))
        })
        .await
    }

    /// Aggregates over every payment.
    #[tracing::instrument(skip(self))]
    pub async fn get_payment_stats(&self, use_cache: bool) -> Result<ResponseEnvelope<PaymentStats>, GatewayError> {
        self.observe("get_payment_stats", async {
            let started = Instant::now();
            self.ensure_serving()?;

            let key = CacheKey::new(ops::PAYMENTS_STATS).build();
            let (stats, cached) = self
                .load(&key, use_cache, || async {
                    let (payments, _) = self.payments_collection(use_cache).await?;
                    Ok::<_, GatewayError>(compute_stats(&payments))
                })
                .await?;

            Ok(ResponseEnvelope::ok(stats, self.metadata(cached, started)))
        })
        .await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════════════════

    async fn payments_collection(&self, use_cache: bool) -> Result<(Vec<Payment>, bool), GatewayError> {
        let key = CacheKey::new(ops::PAYMENTS_LIST).build();
        self.load(&key, use_cache, || async {
            let raw = self.upstream.fetch_posts().await?;
            Ok::<_, GatewayError>(transform_collection(&raw)?)
        })
        .await
    }

    /// Cache read, else `fetch` and write through. Returns `(value, cached)`.
    ///
    /// Cache failures on either side are logged and treated as a miss.
    async fn load<T, F, Fut>(&self, key: &str, use_cache: bool, fetch: F) -> Result<(T, bool), GatewayError>
    where
        T: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        if use_cache {
            match self.cache.get_json(key).await {
                Ok(Some(value)) => {
                    debug!(key, "Cache hit");
                    return Ok((value, true));
                }
                Ok(None) => debug!(key, "Cache miss"),
                Err(e) => warn!(key, error = %e, "Cache read failed, treating as miss"),
            }
        }

        let value = fetch().await?;

        match self.cache.set_json(key, &value, self.config.cache_ttl()).await {
            Ok(_) => debug!(key, ttl = ?self.config.cache_ttl(), "Cached"),
            Err(e) => warn!(key, error = %e, "Cache write failed, response unaffected"),
        }
        Ok((value, false))
    }

    fn metadata(&self, cached: bool, started: Instant) -> ResponseMetadata {
        ResponseMetadata::new(&self.config.api_version, cached, started.elapsed())
    }

    /// Request metrics and outcome logging around one operation.
    async fn observe<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, GatewayError>
    where
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let _timer = LatencyTimer::new(operation);
        let result = fut.await;
        match &result {
            Ok(_) => crate::metrics::record_request(operation, "success"),
            Err(e) => {
                if e.status_code() >= 500 {
                    warn!(operation, code = e.code(), error = %e, "Request failed");
                } else {
                    debug!(operation, code = e.code(), error = %e, "Request rejected");
                }
                crate::metrics::record_request(operation, e.code());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(" 7 ").unwrap(), 7);
        for bad in ["", "  ", "0", "-1", "abc"] {
            let err = parse_id(bad).unwrap_err();
            assert_eq!(err.status_code(), 400, "input {:?}", bad);
        }
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pure transformation functions: legacy → modern, aggregates, joins.
//!
//! Nothing here owns state or performs I/O. Given the same input and the
//! same `now`, every function returns the same output.

use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use thiserror::Error;

use super::legacy::{LegacyPost, LegacyUser};
use super::model::{
    Address, Company, Contact, Coordinates, Customer, EnrichedCustomer, Payment, PaymentHistory,
    PaymentStats, PaymentStatus, RecordMetadata,
};

/// Provenance label written into every record's metadata
pub const SOURCE_LEGACY_API: &str = "legacy-api";

/// Size of the "most recent payments" preview on enriched records
pub const RECENT_PAYMENTS_PREVIEW: usize = 5;

/// Currency for all legacy payments
pub const DEFAULT_CURRENCY: &str = "USD";

/// Epoch all derived payment timestamps are offset from (2024-01-01T00:00:00Z)
const PAYMENT_EPOCH_SECS: i64 = 1_704_067_200;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot transform {record} {id}: {reason}")]
pub struct TransformError {
    pub record: &'static str,
    pub id: u64,
    pub reason: String,
}

/// A legacy record with a modern counterpart.
pub trait Transform {
    type Output;

    /// Transform with an explicit timestamp for `metadata.transformedAt`.
    fn transform_at(&self, now: DateTime<Utc>) -> Result<Self::Output, TransformError>;

    fn transform(&self) -> Result<Self::Output, TransformError> {
        self.transform_at(Utc::now())
    }
}

fn metadata(legacy_id: u64, now: DateTime<Utc>) -> RecordMetadata {
    RecordMetadata {
        source: SOURCE_LEGACY_API.to_string(),
        legacy_id,
        transformed_at: now,
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Transform for LegacyUser {
    type Output = Customer;

    fn transform_at(&self, now: DateTime<Utc>) -> Result<Customer, TransformError> {
        if self.id == 0 {
            return Err(TransformError {
                record: "user",
                id: self.id,
                reason: "id must be positive".into(),
            });
        }
        if self.email.trim().is_empty() {
            return Err(TransformError {
                record: "user",
                id: self.id,
                reason: "email is required".into(),
            });
        }

        let geo = &self.address.geo;
        let coordinates = match (geo.lat.trim().parse::<f64>(), geo.lng.trim().parse::<f64>()) {
            (Ok(latitude), Ok(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        };

        Ok(Customer {
            id: self.id,
            full_name: self.name.trim().to_string(),
            username: self.username.clone(),
            contact: Contact {
                email: self.email.trim().to_ascii_lowercase(),
                phone: self.phone.clone(),
                website: self.website.clone(),
            },
            address: Address {
                street: self.address.street.clone(),
                suite: self.address.suite.clone(),
                city: self.address.city.clone(),
                zip_code: self.address.zipcode.clone(),
                coordinates,
            },
            company: Company {
                name: self.company.name.clone(),
                slogan: self.company.catch_phrase.clone(),
                business: self.company.bs.clone(),
            },
            metadata: metadata(self.id, now),
        })
    }
}

/// Deterministic amount in 10.00..=999.99, derived from the legacy id
fn derived_amount(id: u64) -> f64 {
    let cents = 1_000 + (id.wrapping_mul(7_919) % 99_000);
    cents as f64 / 100.0
}

/// Deterministic status: 70% completed, 20% pending, 10% failed
fn derived_status(id: u64) -> PaymentStatus {
    match id % 10 {
        7 | 8 => PaymentStatus::Pending,
        9 => PaymentStatus::Failed,
        _ => PaymentStatus::Completed,
    }
}

/// Six hours apart per id, so higher ids are more recent
fn derived_created_at(id: u64) -> DateTime<Utc> {
    let offset = i64::try_from(id).unwrap_or(i64::MAX / 2).saturating_mul(6 * 3_600);
    DateTime::from_timestamp(PAYMENT_EPOCH_SECS.saturating_add(offset), 0).unwrap_or_default()
}

impl Transform for LegacyPost {
    type Output = Payment;

    fn transform_at(&self, now: DateTime<Utc>) -> Result<Payment, TransformError> {
        if self.id == 0 {
            return Err(TransformError {
                record: "post",
                id: self.id,
                reason: "id must be positive".into(),
            });
        }

        Ok(Payment {
            id: self.id,
            customer_id: self.user_id,
            amount: derived_amount(self.id),
            currency: DEFAULT_CURRENCY.to_string(),
            status: derived_status(self.id),
            description: self.title.trim().to_string(),
            reference: format!("PAY-{:06}", self.id),
            created_at: derived_created_at(self.id),
            metadata: metadata(self.id, now),
        })
    }
}

/// Order-preserving map over a collection. Fails on the first bad record.
pub fn transform_collection<R: Transform>(raws: &[R]) -> Result<Vec<R::Output>, TransformError> {
    let now = Utc::now();
    raws.iter().map(|r| r.transform_at(now)).collect()
}

/// Count, sum and average payments, split by status.
#[must_use]
pub fn compute_stats<'a, I>(payments: I) -> PaymentStats
where
    I: IntoIterator<Item = &'a Payment>,
{
    let mut stats = PaymentStats::default();
    let mut total_amount = 0.0;

    for p in payments {
        stats.total += 1;
        total_amount += p.amount;
        match p.status {
            PaymentStatus::Completed => stats.completed += 1,
            PaymentStatus::Pending => stats.pending += 1,
            PaymentStatus::Failed => stats.failed += 1,
        }
    }

    stats.total_amount = round_cents(total_amount);
    stats.average_amount = if stats.total == 0 {
        0.0
    } else {
        round_cents(total_amount / stats.total as f64)
    };
    stats
}

/// Join a customer with its payments (`payment.customer_id == customer.id`).
#[must_use]
pub fn enrich(customer: Customer, payments: &[Payment]) -> EnrichedCustomer {
    let mut own: Vec<&Payment> = payments
        .iter()
        .filter(|p| p.customer_id == customer.id)
        .collect();

    let stats = compute_stats(own.iter().copied());

    own.sort_by_key(|p| Reverse((p.created_at, p.id)));
    let recent = own
        .into_iter()
        .take(RECENT_PAYMENTS_PREVIEW)
        .cloned()
        .collect();

    EnrichedCustomer {
        customer,
        payment_history: PaymentHistory { stats, recent },
    }
}

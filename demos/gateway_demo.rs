// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Gateway walkthrough against a live legacy service.
//!
//! Demonstrates:
//! 1. Loading configuration from the environment
//! 2. A cold read, then the same read served from cache
//! 3. Filtering and pagination over one cached collection
//! 4. Enrichment and payment statistics
//! 5. Error envelopes for bad input and unknown ids
//! 6. Health, metrics and clean shutdown
//!
//! # Run
//!
//! ```bash
//! # Defaults to https://jsonplaceholder.typicode.com
//! RUST_LOG=legacy_gateway=debug cargo run --example gateway_demo
//!
//! # With the optional Redis tier
//! REDIS_URL=redis://localhost:6379 cargo run --example gateway_demo
//! ```

use legacy_gateway::gateway::{CustomerQuery, PaymentQuery};
use legacy_gateway::{ErrorEnvelope, Gateway, GatewayConfig, ResponseMetadata};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           legacy-gateway: Walkthrough                         ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and start
    // ─────────────────────────────────────────────────────────────────────────
    let config = GatewayConfig::from_env()?;
    println!("📦 Upstream: {}", config.legacy_api_base_url);
    println!("   Redis:    {}", config.redis_url.as_deref().unwrap_or("(memory only)"));

    let gateway = Gateway::from_config(config.clone());
    gateway.init().await?;
    println!("   ✅ State: {}", gateway.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Cold vs warm
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Listing customers twice...");
    for _ in 0..2 {
        let page = gateway.list_customers(CustomerQuery::default()).await?;
        describe("customers", page.pagination.total, &page.metadata);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Filters
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Payments filtered by status and customer...");
    let pending = gateway
        .list_payments(PaymentQuery {
            status: Some("PENDING".into()),
            limit: 5,
            ..Default::default()
        })
        .await?;
    describe("pending payments", pending.pagination.total, &pending.metadata);
    for payment in &pending.data {
        println!("   └─ {} {:>8.2} {} (customer {})", payment.reference, payment.amount, payment.currency, payment.customer_id);
    }

    let own = gateway
        .list_payments(PaymentQuery {
            customer_id: Some(1),
            page: 2,
            limit: 3,
            ..Default::default()
        })
        .await?;
    println!(
        "   └─ customer 1: page {}/{} of {} payments",
        own.pagination.page, own.pagination.total_pages, own.pagination.total
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Enrichment and stats
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔗 Customer 1 with payment history...");
    let enriched = gateway.get_customer_with_payments("1", true).await?;
    if let Some(customer) = enriched.data {
        let history = &customer.payment_history;
        println!("   └─ {} <{}>", customer.customer.full_name, customer.customer.contact.email);
        println!(
            "      {} payments, {:.2} total, {} recent shown",
            history.stats.total,
            history.stats.total_amount,
            history.recent.len()
        );
    }

    let stats = gateway.get_payment_stats(true).await?;
    if let Some(stats) = stats.data {
        println!("\n📊 All payments: {} total, avg {:.2}", stats.total, stats.average_amount);
        println!(
            "   └─ completed={} pending={} failed={}",
            stats.completed, stats.pending, stats.failed
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Error envelopes
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n⚠️  Error envelopes...");
    for id in ["abc", "99999"] {
        if let Err(err) = gateway.get_payment(id, true).await {
            let metadata = ResponseMetadata::new(&config.api_version, false, Duration::ZERO);
            let envelope = ErrorEnvelope::failure(&err, config.production, metadata);
            println!("   └─ get_payment({:?}) → {}", id, serde_json::to_string(&envelope)?);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Health, metrics, shutdown
    // ─────────────────────────────────────────────────────────────────────────
    let health = gateway.health();
    println!("\n🩺 Health: {}", serde_json::to_string_pretty(&health)?);

    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    gateway.shutdown().await;
    println!("\n🛑 Shutdown complete. State: {}", gateway.state());

    Ok(())
}

fn describe(what: &str, total: usize, metadata: &ResponseMetadata) {
    let source = if metadata.cached { "cache" } else { "upstream" };
    println!(
        "   └─ {} {} from {} in {}ms",
        total, what, source, metadata.processing_time_ms
    );
}

/// Print captured counters and histograms, sorted by name
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };

        let rendered = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={:.4}s", count, sum)
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }

    lines.sort();
    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   └─ {}", line);
    }
}

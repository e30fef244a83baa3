// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Fixed-window rate limiting per caller.
//!
//! Each caller key gets `max_requests` per `window`. The window starts at the
//! caller's first request and resets once it has fully elapsed. Elapsed
//! windows are swept at most once per window from inside [`RateLimiter::check`],
//! so callers that never return do not accumulate.
//!
//! # Example
//!
//! ```
//! use legacy_gateway::RateLimiter;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = RateLimiter::new(2, Duration::from_secs(60));
//! assert!(limiter.check("10.0.0.1").is_ok());
//! assert!(limiter.check("10.0.0.1").is_ok());
//! assert!(limiter.check("10.0.0.1").is_err()); // third call in window
//! assert!(limiter.check("10.0.0.2").is_ok());  // separate caller
//! # }
//! ```

use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, Window>,
    last_sweep: Mutex<Instant>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Count one request for `caller`.
    ///
    /// Returns `Err(retry_after)` when the caller is over its budget.
    /// `max_requests == 0` disables limiting.
    pub fn check(&self, caller: &str) -> Result<(), Duration> {
        if self.max_requests == 0 {
            return Ok(());
        }

        let now = Instant::now();
        // Must run before entry() takes a shard lock
        self.maybe_sweep(now);

        let mut entry = self
            .windows
            .entry(caller.to_string())
            .or_insert(Window { started: now, count: 0 });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop windows that have fully elapsed.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn maybe_sweep(&self, now: Instant) {
        // Skip if another caller is already sweeping
        let Some(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last) < self.window {
            return;
        }
        *last = now;
        drop(last);
        self.sweep_at(now);
    }

    fn sweep_at(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.duration_since(w.started) < self.window);
    }

    #[must_use]
    pub fn tracked_callers(&self) -> usize {
        self.windows.len()
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Deterministic legacy records for tests, demos and local fakes.

use super::legacy::{LegacyAddress, LegacyCompany, LegacyGeo, LegacyPost, LegacyUser};

const CITIES: [&str; 5] = ["Gwenborough", "Wisokyburgh", "McKenziehaven", "South Elvis", "Roscoeview"];

/// A fully populated legacy user. City cycles through five names.
#[must_use]
pub fn legacy_user(id: u64) -> LegacyUser {
    let city = CITIES[(id as usize).wrapping_sub(1) % CITIES.len()];
    LegacyUser {
        id,
        name: format!("Customer {}", id),
        username: format!("user{}", id),
        email: format!("User{}@Example.com", id),
        phone: format!("1-770-736-{:04}", id % 10_000),
        website: format!("user{}.example.org", id),
        address: LegacyAddress {
            street: format!("{} Kulas Light", id),
            suite: format!("Apt. {}", 100 + id),
            city: city.to_string(),
            zipcode: format!("{:05}", 90_000 + id % 10_000),
            geo: LegacyGeo {
                lat: format!("{:.4}", -37.3159 + id as f64 / 100.0),
                lng: format!("{:.4}", 81.1496 - id as f64 / 100.0),
            },
        },
        company: LegacyCompany {
            name: format!("Company {}", id),
            catch_phrase: "Multi-layered client-server neural-net".to_string(),
            bs: "harness real-time e-markets".to_string(),
        },
    }
}

#[must_use]
pub fn legacy_post(id: u64, user_id: u64) -> LegacyPost {
    LegacyPost {
        id,
        user_id,
        title: format!("invoice {}", id),
        body: format!("payment body {}", id),
    }
}

/// Users `1..=count`
#[must_use]
pub fn legacy_users(count: u64) -> Vec<LegacyUser> {
    (1..=count).map(legacy_user).collect()
}

/// `per_user` posts for each of `users` users, ids assigned sequentially
/// the way the legacy service numbers them.
#[must_use]
pub fn legacy_posts(users: u64, per_user: u64) -> Vec<LegacyPost> {
    (1..=users)
        .flat_map(|user_id| {
            (1..=per_user).map(move |n| legacy_post((user_id - 1) * per_user + n, user_id))
        })
        .collect()
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! 1-indexed page slicing.

use crate::envelope::Pagination;
use crate::error::GatewayError;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// Reject out-of-range paging parameters.
pub fn validate(page: usize, limit: usize) -> Result<(), GatewayError> {
    if page < 1 {
        return Err(GatewayError::validation("page", "page must be >= 1"));
    }
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(GatewayError::validation(
            "limit",
            format!("limit must be between 1 and {}", MAX_LIMIT),
        ));
    }
    Ok(())
}

/// Slice `items` to `page`. `total` counts every item; pages past the end
/// are empty.
#[must_use]
pub fn paginate<T: Clone>(items: &[T], page: usize, limit: usize) -> (Vec<T>, Pagination) {
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_LIMIT);
    let total = items.len();
    let start = (page - 1).saturating_mul(limit);

    let slice = items.iter().skip(start).take(limit).cloned().collect();
    (
        slice,
        Pagination {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_page_of_twenty_five() {
        let items: Vec<u32> = (1..=25).collect();
        let (page, meta) = paginate(&items, 2, 10);
        assert_eq!(page, (11..=20).collect::<Vec<_>>());
        assert_eq!(meta.total, 25);
        assert_eq!(meta.total_pages, 3);
    }

    #[test]
    fn test_last_partial_page_and_beyond() {
        let items: Vec<u32> = (1..=25).collect();
        assert_eq!(paginate(&items, 3, 10).0, vec![21, 22, 23, 24, 25]);
        assert!(paginate(&items, 4, 10).0.is_empty());
    }

    #[test]
    fn test_empty_collection() {
        let (page, meta) = paginate::<u32>(&[], 1, 10);
        assert!(page.is_empty());
        assert_eq!(meta.total_pages, 0);
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate(1, 100).is_ok());
        assert!(validate(0, 10).is_err());
        assert!(validate(1, 0).is_err());
        assert!(validate(1, 101).is_err());
    }
}

// Coupon engine, administration and redemption
pub mod coupons;

// User notification center
pub mod notifications;

use serde::Deserialize;

/// Page size bounds applied to every listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_per_page: 20,
            max_per_page: 100,
        }
    }
}

/// Requested page, one-based
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PageLimits {
    /// Resolves a request into a concrete `(page, per_page)` pair
    pub fn resolve(&self, request: PageRequest) -> (u64, u64) {
        let page = request.page.unwrap_or(1).max(1);
        let per_page = request
            .per_page
            .unwrap_or(self.default_per_page)
            .clamp(1, self.max_per_page.max(1));
        (page, per_page)
    }
}

/// One page of a listing plus the size of the whole listing
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<T> Paged<T> {
    pub fn from_all(items: Vec<T>, page: u64, per_page: u64) -> Self {
        let total = items.len() as u64;
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        let items = items
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(per_page).unwrap_or(usize::MAX))
            .collect();
        Self {
            items,
            total,
            page,
            per_page,
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.total == 0 || self.per_page == 0 {
            0
        } else {
            (self.total + self.per_page - 1) / self.per_page
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_capped() {
        let limits = PageLimits {
            default_per_page: 10,
            max_per_page: 50,
        };
        assert_eq!(limits.resolve(PageRequest::default()), (1, 10));
        assert_eq!(
            limits.resolve(PageRequest {
                page: Some(0),
                per_page: Some(500)
            }),
            (1, 50)
        );
    }

    #[test]
    fn slices_the_requested_page() {
        let paged = Paged::from_all((1..=25).collect::<Vec<u32>>(), 3, 10);
        assert_eq!(paged.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(paged.total, 25);
        assert_eq!(paged.total_pages(), 3);

        let beyond = Paged::from_all(vec![1, 2], 5, 10);
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 2);
    }
}

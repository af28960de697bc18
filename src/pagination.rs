use serde::Serialize;

/// Page position and totals for a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    /// 1-based page number.
    pub page: i64,
    /// Items per page.
    pub page_size: i64,
    /// Items across all pages.
    pub total_items: i64,
    /// Number of pages.
    pub total_pages: i64,
}

impl PaginationMeta {
    /// Clamp the requested window and compute totals.
    ///
    /// `page` defaults to 1, `page_size` to `default_size`, capped at `max_size`.
    pub fn new(
        page: Option<i64>,
        page_size: Option<i64>,
        default_size: i64,
        max_size: i64,
        total_items: i64,
    ) -> Self {
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.unwrap_or(default_size).clamp(1, max_size.max(1));

        Self {
            page,
            page_size,
            total_items,
            total_pages: (total_items + page_size - 1) / page_size,
        }
    }

    /// Row offset of the first item on this page. Saturates for huge page numbers.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_totals() {
        let meta = PaginationMeta::new(None, None, 10, 50, 23);
        assert_eq!(meta.page, 1);
        assert_eq!(meta.page_size, 10);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        let meta = PaginationMeta::new(Some(0), Some(500), 10, 50, 0);
        assert_eq!(meta.page, 1);
        assert_eq!(meta.page_size, 50);
        assert_eq!(meta.total_pages, 0);

        let meta = PaginationMeta::new(Some(3), Some(-4), 10, 50, 7);
        assert_eq!(meta.page_size, 1);
        assert_eq!(meta.offset(), 2);
    }

    #[test]
    fn test_huge_page_saturates() {
        let meta = PaginationMeta::new(Some(i64::MAX), Some(10), 10, 50, 3);
        assert_eq!(meta.page, i64::MAX);
        assert_eq!(meta.offset(), i64::MAX);
        assert_eq!(meta.total_pages, 1);
    }
}

//! Offset pagination for list screens.

use serde::{Deserialize, Serialize};

/// Default number of rows per page.
pub const DEFAULT_PER_PAGE: u32 = 20;
/// Upper bound on rows per page.
pub const MAX_PER_PAGE: u32 = 100;

/// A 1-based page request, usually deserialized from query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

const fn default_page() -> u32 {
    1
}

const fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PageRequest {
    /// Build a request, clamping out-of-range values.
    #[must_use]
    pub const fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }.clamped()
    }

    /// Page >= 1 and `per_page` within `1..=MAX_PER_PAGE`.
    #[must_use]
    pub const fn clamped(self) -> Self {
        let page = if self.page == 0 { 1 } else { self.page };
        let per_page = if self.per_page == 0 {
            DEFAULT_PER_PAGE
        } else if self.per_page > MAX_PER_PAGE {
            MAX_PER_PAGE
        } else {
            self.per_page
        };
        Self { page, per_page }
    }

    /// SQL `LIMIT`.
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.clamped().per_page as i64
    }

    /// SQL `OFFSET`.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        let c = self.clamped();
        (c.page as i64 - 1) * c.per_page as i64
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Wrap `items` fetched for `request`, given the unpaged row count.
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let request = request.clamped();
        let per_page = u64::from(request.per_page);
        let total_pages = u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX);
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
            total_pages,
        }
    }

    /// Whether a later page exists.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Transform the items, keeping the paging metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// Sort order for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamping() {
        assert_eq!(PageRequest::new(0, 0), PageRequest::new(1, DEFAULT_PER_PAGE));
        assert_eq!(PageRequest::new(3, 500).per_page, MAX_PER_PAGE);
    }

    #[test]
    fn test_limit_offset() {
        let req = PageRequest::new(3, 25);
        assert_eq!(req.limit(), 25);
        assert_eq!(req.offset(), 50);
    }

    #[test]
    fn test_unclamped_request_is_clamped_for_sql() {
        let req = PageRequest {
            page: 0,
            per_page: 1000,
        };
        assert_eq!(req.offset(), 0);
        assert_eq!(req.limit(), i64::from(MAX_PER_PAGE));
    }

    #[test]
    fn test_page_counts() {
        let page = Page::new(vec![1, 2, 3], PageRequest::new(1, 3), 7);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());

        let last = Page::new(vec![7], PageRequest::new(3, 3), 7);
        assert!(!last.has_next());

        let empty: Page<i32> = Page::new(vec![], PageRequest::default(), 0);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn test_map_keeps_metadata() {
        let page = Page::new(vec![1, 2], PageRequest::new(2, 2), 4).map(|n| n * 10);
        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn test_query_defaults() {
        let req: PageRequest = serde_json::from_str("{}").unwrap_or_default();
        assert_eq!(req, PageRequest::default());
    }
}

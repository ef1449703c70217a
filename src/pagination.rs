//! This modules defines the common functionality for paging data.

use serde::{Deserialize, Serialize};

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of items per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may request.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// The query parameters for requesting a page of data.
///
/// Pages are numbered from one.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PageQuery {
    /// The page to fetch.
    pub page: Option<u64>,
    /// The number of items per page.
    pub size: Option<u64>,
}

/// A validated page request that can be turned into SQL `LIMIT`/`OFFSET` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// The one-based page number.
    pub page: u64,
    /// The number of items per page.
    pub size: u64,
}

impl PageRequest {
    /// Fill in missing values from `config` and clamp the page size into `1..=max_page_size`.
    ///
    /// A page number of zero is treated as the first page.
    pub fn from_query(query: PageQuery, config: &PaginationConfig) -> Self {
        let page = query.page.unwrap_or(config.default_page).max(1);
        let size = query
            .size
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size.max(1));

        Self { page, size }
    }

    /// The value for the SQL `LIMIT` clause.
    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    /// The value for the SQL `OFFSET` clause.
    ///
    /// Saturates at `i64::MAX` for page numbers past any real result set.
    pub fn offset(&self) -> i64 {
        let offset = self.page.saturating_sub(1).saturating_mul(self.size);

        i64::try_from(offset).unwrap_or(i64::MAX)
    }
}

/// A page of items along with the information needed to fetch the other pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The items on this page.
    pub content: Vec<T>,
    /// The one-based page number.
    pub page: u64,
    /// The requested number of items per page.
    pub size: u64,
    /// The number of items across all pages.
    pub total_elements: u64,
    /// The number of pages.
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Wrap `content` fetched for `request` out of `total_elements` items.
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            total_pages: total_elements.div_ceil(request.size),
        }
    }
}

//! Pagination contract shared by backend list endpoints

use serde::{Deserialize, Serialize};

/// Default page size for list requests.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// `limit`/`offset` carried by list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Maximum number of results.
    pub limit: u32,
    /// Number of results to skip.
    pub offset: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl PageRequest {
    /// Creates a page request.
    #[must_use]
    pub const fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items in this page.
    pub results: Vec<T>,
    /// Total number of items across all pages.
    #[serde(default, alias = "count")]
    pub total: u64,
    /// Limit the page was requested with.
    #[serde(default)]
    pub limit: u32,
    /// Offset the page was requested with.
    #[serde(default)]
    pub offset: u32,
}

impl<T> Page<T> {
    /// Returns true if more items exist past this page.
    #[must_use]
    pub fn has_more(&self) -> bool {
        u64::from(self.offset) + (self.results.len() as u64) < self.total
    }

    /// Request for the following page, if any.
    #[must_use]
    pub fn next_request(&self) -> Option<PageRequest> {
        let fetched = u32::try_from(self.results.len()).ok()?;
        self.has_more()
            .then(|| PageRequest::new(self.limit, self.offset.saturating_add(fetched)))
    }
}

//! Paginated results.

use serde::{Deserialize, Serialize};

/// One page of query results.
///
/// `current` is 1-based. A `size` of zero disables paging and returns every
/// matching row on a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub current: u64,
    pub size: u64,
    /// Total matching rows; only filled when `search_count` is set
    pub total: u64,
    pub records: Vec<T>,
    /// Run a COUNT query alongside the page query
    pub search_count: bool,
}

impl<T> Page<T> {
    /// Request page `current` (1-based) holding up to `size` rows.
    pub fn new(current: u64, size: u64) -> Self {
        Self {
            current: current.max(1),
            size,
            total: 0,
            records: Vec::new(),
            search_count: true,
        }
    }

    /// Skip the COUNT query.
    pub fn without_count(mut self) -> Self {
        self.search_count = false;
        self
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        self.current.saturating_sub(1).saturating_mul(self.size)
    }

    /// Number of pages given `total`.
    pub fn pages(&self) -> u64 {
        if self.size == 0 {
            return u64::from(self.total > 0);
        }
        self.total.div_ceil(self.size)
    }

    pub fn has_next(&self) -> bool {
        self.current < self.pages()
    }

    pub fn has_previous(&self) -> bool {
        self.current > 1
    }

    /// Convert the records, keeping the paging fields.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            current: self.current,
            size: self.size,
            total: self.total,
            records: self.records.into_iter().map(f).collect(),
            search_count: self.search_count,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

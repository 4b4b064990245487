//! Offset/limit pagination.
//!
//! [`PaginationParams`] turns a 1-indexed page number into the offset and
//! limit sent to the store; [`Page`] carries one fetched page together with
//! the navigation metadata.

use serde::{Deserialize, Serialize};

/// A single page of results.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of items across all pages.
    pub count: usize,
    /// The next page number (if more pages exist).
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }
}

/// Builder for [`Page`].
pub struct PageBuilder<T> {
    items: Vec<T>,
    count: usize,
    next_page: Option<usize>,
    previous_page: Option<usize>,
}

impl<T> PageBuilder<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_next_page(mut self, next_page: Option<usize>) -> Self {
        self.next_page = next_page;
        self
    }

    pub fn with_previous_page(mut self, previous_page: Option<usize>) -> Self {
        self.previous_page = previous_page;
        self
    }

    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// Which page to retrieve and how many items per page.
///
/// Pages are 1-indexed; page 0 is treated as page 1.
///
/// ```ignore
/// use bookstore_core::page::PaginationParams;
///
/// let params = PaginationParams::new(2, 5);
/// assert_eq!(params.offset(), 5);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PaginationParams {
    /// The page number (1-indexed).
    pub page: usize,
    /// Number of items per page.
    pub per_page: usize,
}

impl PaginationParams {
    pub fn new(page: usize, per_page: usize) -> Self {
        Self { page: page.max(1), per_page }
    }

    /// Number of items to skip before this page.
    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1) * self.per_page
    }

    /// Builds the page wrapper for items fetched at this page's offset, given
    /// the total number of matching items.
    pub fn wrap<T>(&self, items: Vec<T>, count: usize) -> Page<T> {
        let end = self.offset() + items.len();

        Page::builder(items)
            .with_count(count)
            .with_next_page(if end < count { Some(self.page + 1) } else { None })
            .with_previous_page(if self.page > 1 { Some(self.page - 1) } else { None })
            .build()
    }
}

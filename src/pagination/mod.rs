//! Cursor pagination over `Link` headers.
//!
//! A collection is fetched page by page by following `rel="next"` links
//! until none remains. Traversal is lazy: nothing past the first page is
//! requested until the consumer asks for it, and every page goes through
//! the full pipeline (rate limit, retry, logging).

mod link;
mod page;
mod paginator;

use serde::Deserialize;

pub use link::{PageLinks, Relation};
pub use page::Page;
pub use paginator::Paginator;

/// Default cap on pages fetched by one traversal.
pub const DEFAULT_MAX_PAGES: usize = 10_000;

/// Pagination configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Stop a traversal after this many pages.
    pub max_pages: usize,
    /// Field holding the items when the body is an object rather than an array.
    pub items_key: Option<String>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            items_key: None,
        }
    }
}

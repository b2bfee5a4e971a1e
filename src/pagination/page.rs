use url::Url;

use crate::client::ApiRequest;
use crate::pagination::PageLinks;

/// One page of a collection.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Items in server order
    pub items: Vec<T>,
    /// Navigation links from the response
    pub links: PageLinks,
    /// URL this page was served from
    pub url: Url,
    /// Request the page was fetched with; cursor follows reuse its headers and options
    pub(crate) request: ApiRequest,
}

impl<T> Page<T> {
    pub(crate) fn new(items: Vec<T>, links: PageLinks, url: Url, request: ApiRequest) -> Self {
        Self {
            items,
            links,
            url,
            request,
        }
    }

    /// Whether the server advertised a next page.
    pub fn has_next(&self) -> bool {
        self.links.next.is_some()
    }

    /// Absolute URL of the next page.
    pub fn next_url(&self) -> Option<&Url> {
        self.links.next.as_ref()
    }

    /// Number of items on this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether this page carries no items. Later pages may still have some.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the page, keeping only its items.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

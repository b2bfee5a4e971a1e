//! Collection traversal.
//!
//! Each page is fetched with the same headers and request options as the
//! first, so pages share its quota bucket, retry policy and cancellation.

use std::collections::HashSet;

use futures_util::{Stream, TryStreamExt, stream};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::client::{ApiRequest, ApiResponse, Execute};
use crate::error::RestError;
use crate::middleware::redact_url;
use crate::pagination::{Page, PageLinks, PaginationConfig};

/// Walks a paginated collection through any [`Execute`] implementation.
///
/// [`pages`](Self::pages) and [`all`](Self::all) are lazy and stop on the
/// first error, on a link cycle, or at `max_pages`. Manual traversal with
/// [`next_page`](Self::next_page) only guards against a page linking to itself.
#[derive(Debug, Clone)]
pub struct Paginator<'a, E> {
    executor: &'a E,
    config: PaginationConfig,
}

impl<'a, E: Execute> Paginator<'a, E> {
    pub fn new(executor: &'a E, config: PaginationConfig) -> Self {
        Self { executor, config }
    }

    /// Fetch the first page.
    pub async fn first_page<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<Page<T>, RestError> {
        fetch_page(self.executor, request, self.config.items_key.as_deref()).await
    }

    /// Fetch the page after `page`. `None` when there is no next link or
    /// the next link points back at `page`.
    pub async fn next_page<T: DeserializeOwned>(
        &self,
        page: &Page<T>,
    ) -> Result<Option<Page<T>>, RestError> {
        let Some(next) = page.links.next.as_ref() else {
            return Ok(None);
        };
        if *next == page.url {
            tracing::warn!(url = %redact_url(next), "page links to itself, stopping");
            return Ok(None);
        }

        let request = page.request.follow(next);
        fetch_page(self.executor, request, self.config.items_key.as_deref())
            .await
            .map(Some)
    }

    /// Lazily stream pages, starting with `request`.
    pub fn pages<T>(
        &self,
        request: ApiRequest,
    ) -> impl Stream<Item = Result<Page<T>, RestError>> + use<'a, E, T>
    where
        T: DeserializeOwned + Send,
    {
        let traversal = Traversal {
            executor: self.executor,
            items_key: self.config.items_key.clone(),
            max_pages: self.config.max_pages,
            pending: Some(request),
            visited: HashSet::new(),
            fetched: 0,
        };

        stream::try_unfold(traversal, |mut traversal| async move {
            let Some(request) = traversal.pending.take() else {
                return Ok(None);
            };

            let page: Page<T> =
                fetch_page(traversal.executor, request, traversal.items_key.as_deref()).await?;
            traversal.fetched += 1;
            traversal.visited.insert(page.url.clone());
            traversal.pending = traversal.follow(&page);

            Ok::<_, RestError>(Some((page, traversal)))
        })
    }

    /// Lazily stream items across all pages, in page order.
    pub fn all<T>(
        &self,
        request: ApiRequest,
    ) -> impl Stream<Item = Result<T, RestError>> + use<'a, E, T>
    where
        T: DeserializeOwned + Send,
    {
        self.pages(request)
            .map_ok(|page: Page<T>| stream::iter(page.into_items().into_iter().map(Ok::<T, RestError>)))
            .try_flatten()
    }

    /// Collect every item across all pages.
    pub async fn collect_all<T>(&self, request: ApiRequest) -> Result<Vec<T>, RestError>
    where
        T: DeserializeOwned + Send,
    {
        self.all(request).try_collect().await
    }
}

struct Traversal<'a, E> {
    executor: &'a E,
    items_key: Option<String>,
    max_pages: usize,
    pending: Option<ApiRequest>,
    visited: HashSet<Url>,
    fetched: usize,
}

impl<E> Traversal<'_, E> {
    fn follow<T>(&self, page: &Page<T>) -> Option<ApiRequest> {
        let next = page.links.next.as_ref()?;

        if self.visited.contains(next) {
            tracing::warn!(url = %redact_url(next), "pagination cycle detected, stopping");
            return None;
        }
        if self.fetched >= self.max_pages {
            tracing::warn!(max_pages = self.max_pages, "page limit reached, stopping");
            return None;
        }

        Some(page.request.follow(next))
    }
}

async fn fetch_page<E, T>(
    executor: &E,
    request: ApiRequest,
    items_key: Option<&str>,
) -> Result<Page<T>, RestError>
where
    E: Execute,
    T: DeserializeOwned,
{
    let template = request.clone();
    let response = executor.execute(request).await?;
    let links = PageLinks::from_headers(response.headers(), response.url());
    let items = extract_items(&response, items_key)?;

    Ok(Page::new(items, links, response.url().clone(), template))
}

/// Items come from a top-level array, or from `items_key` in an object.
fn extract_items<T: DeserializeOwned>(
    response: &ApiResponse,
    items_key: Option<&str>,
) -> Result<Vec<T>, RestError> {
    if response.body().iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let body: Value = response.json()?;
    let items = match (body, items_key) {
        (Value::Array(items), _) => items,
        (Value::Object(mut object), Some(key)) => match object.remove(key) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(RestError::InvalidResponse(format!(
                    "`{key}` is not an array"
                )));
            }
        },
        _ => {
            return Err(RestError::InvalidResponse(
                "expected a JSON array of items".to_string(),
            ));
        }
    };

    items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(RestError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use reqwest::StatusCode;
    use reqwest::header::{HeaderMap, HeaderValue, LINK};
    use std::collections::HashMap;
    use std::sync::Mutex;

    const BASE: &str = "https://api.example";

    /// Serves canned pages keyed by absolute URL and records what was asked for.
    #[derive(Default)]
    struct ScriptedExecutor {
        pages: HashMap<String, (String, Option<String>)>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedExecutor {
        fn page(mut self, url: &str, body: &str, link: Option<&str>) -> Self {
            self.pages
                .insert(url.to_string(), (body.to_string(), link.map(str::to_string)));
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Execute for ScriptedExecutor {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, RestError> {
            let url = if request.path.starts_with('/') {
                format!("{BASE}{}", request.path)
            } else {
                request.path.clone()
            };
            self.requested.lock().unwrap().push(url.clone());

            let (body, link) = self
                .pages
                .get(&url)
                .cloned()
                .unwrap_or_else(|| panic!("unexpected request for {url}"));
            let mut headers = HeaderMap::new();
            if let Some(link) = link {
                headers.insert(LINK, HeaderValue::from_str(&link).unwrap());
            }

            Ok(ApiResponse::new(
                StatusCode::OK,
                headers,
                Url::parse(&url).unwrap(),
                body,
            ))
        }
    }

    fn three_pages() -> ScriptedExecutor {
        ScriptedExecutor::default()
            .page(
                "https://api.example/items",
                "[1, 2]",
                Some(r#"</items?page=2>; rel="next""#),
            )
            .page(
                "https://api.example/items?page=2",
                "[]",
                Some(r#"</items?page=3>; rel="next""#),
            )
            .page("https://api.example/items?page=3", "[3]", None)
    }

    #[tokio::test]
    async fn test_all_matches_manual_paging() {
        let executor = three_pages();
        let paginator = Paginator::new(&executor, PaginationConfig::default());

        let streamed: Vec<u32> = paginator.collect_all(ApiRequest::get("/items")).await.unwrap();

        let mut manual = Vec::new();
        let mut page: Page<u32> = paginator.first_page(ApiRequest::get("/items")).await.unwrap();
        manual.extend(page.items.clone());
        while let Some(next) = paginator.next_page(&page).await.unwrap() {
            manual.extend(next.items.clone());
            page = next;
        }

        assert_eq!(streamed, vec![1, 2, 3]);
        assert_eq!(streamed, manual);
    }

    #[tokio::test]
    async fn test_traversal_is_lazy() {
        let executor = three_pages();
        let paginator = Paginator::new(&executor, PaginationConfig::default());

        let items = paginator.all::<u32>(ApiRequest::get("/items"));
        futures_util::pin_mut!(items);
        assert_eq!(items.next().await.unwrap().unwrap(), 1);
        assert_eq!(executor.requested().len(), 1);
    }

    #[tokio::test]
    async fn test_self_link_stops() {
        let executor = ScriptedExecutor::default().page(
            "https://api.example/loop",
            "[1]",
            Some(r#"</loop>; rel="next""#),
        );
        let paginator = Paginator::new(&executor, PaginationConfig::default());

        let page: Page<u32> = paginator.first_page(ApiRequest::get("/loop")).await.unwrap();
        assert!(paginator.next_page(&page).await.unwrap().is_none());

        let all: Vec<u32> = paginator.collect_all(ApiRequest::get("/loop")).await.unwrap();
        assert_eq!(all, vec![1]);
        assert_eq!(executor.requested().len(), 2);
    }

    #[tokio::test]
    async fn test_cycle_and_page_cap() {
        let executor = ScriptedExecutor::default()
            .page("https://api.example/a", "[1]", Some(r#"</b>; rel="next""#))
            .page("https://api.example/b", "[2]", Some(r#"</a>; rel="next""#));
        let paginator = Paginator::new(&executor, PaginationConfig::default());
        let all: Vec<u32> = paginator.collect_all(ApiRequest::get("/a")).await.unwrap();
        assert_eq!(all, vec![1, 2]);

        let capped = Paginator::new(
            &executor,
            PaginationConfig {
                max_pages: 1,
                items_key: None,
            },
        );
        let first_only: Vec<u32> = capped.collect_all(ApiRequest::get("/a")).await.unwrap();
        assert_eq!(first_only, vec![1]);
    }

    #[tokio::test]
    async fn test_items_key_envelope() {
        let executor = ScriptedExecutor::default().page(
            "https://api.example/wrapped",
            r#"{"data": [{"id": 7}], "meta": {}}"#,
            None,
        );
        let paginator = Paginator::new(
            &executor,
            PaginationConfig {
                items_key: Some("data".to_string()),
                ..PaginationConfig::default()
            },
        );

        let items: Vec<HashMap<String, u32>> =
            paginator.collect_all(ApiRequest::get("/wrapped")).await.unwrap();
        assert_eq!(items[0]["id"], 7);

        let bare = Paginator::new(&executor, PaginationConfig::default());
        let result = bare.collect_all::<serde_json::Value>(ApiRequest::get("/wrapped")).await;
        assert!(matches!(result, Err(RestError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn test_follow_keeps_request_options() {
        let executor = three_pages();
        let paginator = Paginator::new(&executor, PaginationConfig::default());

        let page: Page<u32> = paginator
            .first_page(ApiRequest::get("/items").bucket("reports"))
            .await
            .unwrap();
        let next = page.request.follow(page.next_url().unwrap());
        assert_eq!(next.options.bucket.as_deref(), Some("reports"));
        assert_eq!(next.path, "https://api.example/items?page=2");
    }
}

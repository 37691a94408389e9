//! Shared request/response types and the pagination loop for list endpoints.

use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

/// The YouTube Data API never returns more than this many items per page.
pub const MAX_PAGE_SIZE: u32 = 50;

/// The list endpoints this crate knows how to page through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Channels,
    PlaylistItems,
    Videos,
    Search,
    CommentThreads,
}

impl Endpoint {
    /// Path segment under `https://www.googleapis.com/youtube/v3/`.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Channels => "channels",
            Endpoint::PlaylistItems => "playlistItems",
            Endpoint::Videos => "videos",
            Endpoint::Search => "search",
            Endpoint::CommentThreads => "commentThreads",
        }
    }
}

/// One call to a `*.list` endpoint, minus the page cursor.
///
/// The same request is replayed for every page; only the `pageToken` changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub endpoint: Endpoint,
    /// Comma-separated resource parts, e.g. `snippet,statistics`.
    pub part: String,
    /// Filters such as `id`, `playlistId`, `q`, or `videoId`.
    pub params: Vec<(&'static str, String)>,
    pub max_results: u32,
}

impl ListRequest {
    pub fn new(endpoint: Endpoint, part: impl Into<String>) -> Self {
        Self {
            endpoint,
            part: part.into(),
            params: Vec::new(),
            max_results: MAX_PAGE_SIZE,
        }
    }

    pub fn param(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.params.push((key, value.into()));
        self
    }

    /// Sets the page size, clamped to `1..=50`.
    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// The full query string for one page of this request.
    pub fn query(&self, page_token: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = Vec::with_capacity(self.params.len() + 3);
        query.push(("part", self.part.clone()));
        query.extend(self.params.iter().cloned());
        query.push(("maxResults", self.max_results.to_string()));
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        query
    }
}

/// One page of a list response.
///
/// Items are kept as raw JSON trees; they only get a shape once they go through a
/// [`Schema`](crate::normalize::Schema).
#[derive(Debug, Deserialize)]
pub struct Page<T = Value> {
    #[serde(default = "VecDeque::new")]
    pub items: VecDeque<T>,
    /// Absent on the last page.
    #[serde(rename = "nextPageToken", default)]
    pub next_page_token: Option<String>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: Option<PageInfo>,
}

impl<T> Page<T> {
    pub fn new(items: impl IntoIterator<Item = T>, next_page_token: Option<String>) -> Self {
        Self {
            items: items.into_iter().collect(),
            next_page_token,
            page_info: None,
        }
    }

    /// The cursor for the next page, if there is one.
    ///
    /// An empty token is treated the same as a missing one.
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "totalResults", default)]
    pub total_results: u32,
    #[serde(rename = "resultsPerPage", default)]
    pub results_per_page: u32,
}

/// The one RPC every resource goes through: fetch a single page of a list endpoint.
///
/// [`YouTubeClient`](crate::youtube_api::YouTubeClient) implements this over HTTP; tests
/// implement it over canned pages.
pub trait ListResources {
    fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<String>,
    ) -> impl Future<Output = eyre::Result<Page>> + Send;
}

impl<S: ListResources + Sync> ListResources for &S {
    fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<String>,
    ) -> impl Future<Output = eyre::Result<Page>> + Send {
        (**self).list_page(request, page_token)
    }
}

/// Streams every item of `request`, following page cursors until the last page.
///
/// With `cap = Some(n)`, no further page is requested once at least `n` items have arrived.
/// The page holding the `n`th item is still yielded whole. `Some(0)` requests no page at all.
pub fn paginate<'a, S>(
    source: &'a S,
    request: ListRequest,
    cap: Option<usize>,
) -> impl Stream<Item = eyre::Result<Value>> + 'a
where
    S: ListResources + Sync,
{
    PagedStream::new(move |page_token| {
        let request = request.clone();
        async move { source.list_page(&request, page_token).await }
    })
    .with_cap(cap)
}

type OneFuturePage<'a, F, T> = Pin<Box<dyn Future<Output = eyre::Result<(F, Page<T>)>> + 'a + Send>>;

/// A paginated stream that fetches subsequent pages from a list endpoint on demand.
///
/// Items are yielded one by one; the next page is requested only once the current one is
/// drained. Only forward pagination is supported.
pub struct PagedStream<'a, T, F> {
    /// Current batch of items from the most recent response
    current_items: VecDeque<T>,
    /// The request for the next page, if any
    pending_request: Option<OneFuturePage<'a, F, T>>,
    /// Stop requesting pages once this many items have been received
    cap: Option<usize>,
    received: usize,
    is_done: bool,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    pub fn new<Fut>(fetcher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
    {
        let first_page = async move {
            let page = fetcher(None).await?;
            Ok((fetcher, page))
        };
        Self {
            current_items: VecDeque::new(),
            pending_request: Some(Box::pin(first_page)),
            cap: None,
            received: 0,
            is_done: false,
        }
    }

    /// Stops requesting pages once `cap` items have arrived. A cap of zero requests nothing.
    pub fn with_cap(mut self, cap: Option<usize>) -> Self {
        self.cap = cap;
        if self.cap_reached() {
            self.pending_request = None;
            self.is_done = true;
        }
        self
    }

    fn cap_reached(&self) -> bool {
        self.cap.is_some_and(|cap| self.received >= cap)
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
{
    type Item = eyre::Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if self.is_done {
                return Poll::Ready(None);
            }

            let Some(pending) = self.pending_request.as_mut() else {
                self.is_done = true;
                return Poll::Ready(None);
            };

            match pending.as_mut().poll(cx) {
                Poll::Ready(Ok((fetcher, page))) => {
                    let next_token = page.next_cursor().map(str::to_string);
                    self.received += page.items.len();
                    self.current_items.extend(page.items);

                    tracing::trace!(
                        received = self.received,
                        has_next_page = next_token.is_some(),
                        "received page"
                    );

                    match next_token {
                        Some(next_token) if !self.cap_reached() => {
                            // queued, but not polled until this page is drained
                            self.pending_request = Some(Box::pin(async move {
                                let page = fetcher(Some(next_token)).await?;
                                Ok((fetcher, page))
                            }));
                        }
                        _ => {
                            self.is_done = true;
                            self.pending_request = None;
                        }
                    }
                }
                Poll::Ready(Err(e)) => {
                    self.pending_request = None;
                    self.is_done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

//! In-memory [`ListResources`] for unit tests.

use crate::youtube_api::{ListRequest, ListResources, Page};
use serde_json::{Value, json};
use std::sync::Mutex;

type Responder = Box<dyn Fn(&ListRequest, Option<&str>) -> eyre::Result<Page> + Send + Sync>;

pub(crate) struct MockSource {
    respond: Responder,
    calls: Mutex<Vec<(ListRequest, Option<String>)>>,
}

impl MockSource {
    pub(crate) fn new(
        respond: impl Fn(&ListRequest, Option<&str>) -> eyre::Result<Page> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serves `pages` in order for any request. Page `i` is linked to page `i + 1` through
    /// the cursor `page-{i+1}`; the last page has no cursor.
    pub(crate) fn paged(pages: Vec<Vec<Value>>) -> Self {
        Self::new(move |_, token| {
            let index = match token {
                None => 0,
                Some(token) => token
                    .strip_prefix("page-")
                    .and_then(|i| i.parse().ok())
                    .ok_or_else(|| eyre::eyre!("unexpected page token {token}"))?,
            };
            let items = pages
                .get(index)
                .ok_or_else(|| eyre::eyre!("no page {index}"))?;
            let next = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));
            Ok(Page::new(items.clone(), next))
        })
    }

    pub(crate) fn calls(&self) -> Vec<(ListRequest, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl ListResources for MockSource {
    async fn list_page(&self, request: &ListRequest, page_token: Option<String>) -> eyre::Result<Page> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), page_token.clone()));
        (self.respond)(request, page_token.as_deref())
    }
}

/// Items `{"id": "<n>"}` for every `n` in `range`.
pub(crate) fn id_items(range: impl IntoIterator<Item = usize>) -> Vec<Value> {
    range.into_iter().map(|n| json!({ "id": n.to_string() })).collect()
}

/// The value of query parameter `key` in `request`.
pub(crate) fn param<'r>(request: &'r ListRequest, key: &str) -> Option<&'r str> {
    request
        .params
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, value)| value.as_str())
}

/// The `id` parameter of a request, split on commas.
pub(crate) fn requested_ids(request: &ListRequest) -> Vec<String> {
    param(request, "id")
        .map(|ids| ids.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

//! Draining paginated streams into owned collections.

use crate::youtube_api::{ListRequest, ListResources, MAX_PAGE_SIZE, paginate};
use eyre::Context;
use indexmap::IndexSet;
use serde_json::Value;
use std::collections::HashSet;
use std::pin::pin;
use tokio_stream::{Stream, StreamExt};

/// Collects every item of `stream`, stopping at the first error.
pub async fn collect_all<T>(stream: impl Stream<Item = eyre::Result<T>>) -> eyre::Result<Vec<T>> {
    let mut stream = pin!(stream);
    let mut items = Vec::new();
    while let Some(item) = stream.next().await {
        items.push(item?);
    }
    Ok(items)
}

/// Collects the items of `stream`, dropping any whose id was already seen.
///
/// Order is first-seen. Items for which `id_of` returns `None` are always kept.
pub async fn collect_unique<T>(
    stream: impl Stream<Item = eyre::Result<T>>,
    mut id_of: impl FnMut(&T) -> Option<String>,
) -> eyre::Result<Vec<T>> {
    let mut stream = pin!(stream);
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    let mut duplicates = 0usize;
    while let Some(item) = stream.next().await {
        let item = item?;
        if let Some(id) = id_of(&item)
            && !seen.insert(id)
        {
            duplicates += 1;
            continue;
        }
        items.push(item);
    }
    if duplicates > 0 {
        tracing::debug!(duplicates, kept = items.len(), "dropped duplicate items");
    }
    Ok(items)
}

/// Looks up `ids` in batches of at most 50, one batch after another.
///
/// `request_for` builds the request for one batch, e.g. [`videos::by_ids`]. Items come back in
/// batch order; within a batch, in whatever order the API returns them. Ids the API does not
/// know are silently absent from the result. Repeated ids are looked up once, at their first
/// position.
///
/// [`videos::by_ids`]: crate::youtube_api::videos::by_ids
pub async fn fetch_in_batches<S>(
    source: &S,
    ids: &[String],
    request_for: impl Fn(&[String]) -> ListRequest,
) -> eyre::Result<Vec<Value>>
where
    S: ListResources + Sync,
{
    let unique: IndexSet<&String> = ids.iter().collect();
    if unique.len() < ids.len() {
        tracing::debug!(duplicates = ids.len() - unique.len(), "dropped repeated ids");
    }
    let ids: Vec<String> = unique.into_iter().cloned().collect();

    let mut items = Vec::with_capacity(ids.len());
    for (n, batch) in ids.chunks(MAX_PAGE_SIZE as usize).enumerate() {
        let request = request_for(batch);
        let endpoint = request.endpoint;
        let batch_items = collect_all(paginate(source, request, None))
            .await
            .with_context(|| format!("look up batch {n} of {} {} ids", batch.len(), endpoint.path()))?;
        tracing::debug!(
            batch = n,
            requested = batch.len(),
            found = batch_items.len(),
            "looked up batch"
        );
        items.extend(batch_items);
    }
    Ok(items)
}

//! High-level extraction operations.
//!
//! Each operation is the same loop with different parameters: page through a list endpoint,
//! collect (and usually deduplicate) the items, optionally look the ids up in batches for
//! more detail, and normalize everything into [`Record`]s.

use crate::collector::{collect_all, collect_unique, fetch_in_batches};
use crate::error::ApiError;
use crate::filter::{FilterSet, LatestActivity};
use crate::normalize::{Record, Schema};
use crate::youtube_api::{
    ListResources, SearchType, channels, comments, paginate, playlist_items, search, videos,
};
use eyre::Context;
use http::StatusCode;
use indexmap::IndexSet;
use jiff::Timestamp;
use serde_json::Value;
use std::collections::HashSet;
use tracing::instrument;

/// Runs extractions against any [`ListResources`], usually a
/// [`YouTubeClient`](crate::youtube_api::YouTubeClient).
#[derive(Debug, Clone)]
pub struct Harvester<S> {
    source: S,
}

impl<S> Harvester<S>
where
    S: ListResources + Sync,
{
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The id of the playlist holding every upload of `channel_id`.
    #[instrument(skip(self))]
    pub async fn uploads_playlist_id(&self, channel_id: &str) -> eyre::Result<String> {
        let page = self
            .source
            .list_page(&channels::content_details(channel_id), None)
            .await
            .with_context(|| format!("look up channel {channel_id}"))?;
        page.items
            .front()
            .and_then(channels::uploads_playlist_id)
            .map(str::to_string)
            .ok_or_else(|| eyre::eyre!("channel {channel_id} does not exist or has no uploads playlist"))
    }

    /// Every distinct video id in a playlist, in playlist order.
    #[instrument(skip(self))]
    pub async fn playlist_video_ids(
        &self,
        playlist_id: &str,
        cap: Option<usize>,
    ) -> eyre::Result<Vec<String>> {
        let items = paginate(&self.source, playlist_items::in_playlist(playlist_id), cap);
        let items = collect_unique(items, |item| playlist_items::SCHEMA.id_of(item))
            .await
            .with_context(|| format!("list items of playlist {playlist_id}"))?;
        let ids: Vec<_> = items
            .iter()
            .filter_map(|item| playlist_items::SCHEMA.id_of(item))
            .collect();
        tracing::info!(playlist_id, videos = ids.len(), "listed playlist");
        Ok(ids)
    }

    /// The raw playlist items of a playlist, normalized but without further lookups.
    pub async fn playlist_item_records(
        &self,
        playlist_id: &str,
        cap: Option<usize>,
    ) -> eyre::Result<Vec<Record>> {
        let items = paginate(&self.source, playlist_items::in_playlist(playlist_id), cap);
        let items = collect_unique(items, |item| playlist_items::SCHEMA.id_of(item))
            .await
            .with_context(|| format!("list items of playlist {playlist_id}"))?;
        tracing::info!(playlist_id, items = items.len(), "listed playlist");
        Ok(normalize_all(&playlist_items::SCHEMA, &items))
    }

    /// Full channel records for `ids`, looked up 50 at a time.
    #[instrument(skip_all, fields(channels = ids.len()))]
    pub async fn channel_records(&self, ids: &[String]) -> eyre::Result<Vec<Record>> {
        let items = fetch_in_batches(&self.source, ids, channels::by_ids).await?;
        report_missing(&channels::SCHEMA, ids, &items);
        Ok(normalize_all(&channels::SCHEMA, &items))
    }

    /// Full video records for `ids`, looked up 50 at a time.
    #[instrument(skip_all, fields(videos = ids.len()))]
    pub async fn video_records(&self, ids: &[String]) -> eyre::Result<Vec<Record>> {
        let items = fetch_in_batches(&self.source, ids, videos::by_ids).await?;
        report_missing(&videos::SCHEMA, ids, &items);
        Ok(normalize_all(&videos::SCHEMA, &items))
    }

    /// Video records for everything in a playlist.
    pub async fn playlist_videos(
        &self,
        playlist_id: &str,
        cap: Option<usize>,
    ) -> eyre::Result<Vec<Record>> {
        let ids = self.playlist_video_ids(playlist_id, cap).await?;
        self.video_records(&ids).await
    }

    /// Video records for a channel's uploads, newest first.
    #[instrument(skip(self))]
    pub async fn channel_videos(
        &self,
        channel_id: &str,
        cap: Option<usize>,
    ) -> eyre::Result<Vec<Record>> {
        let uploads = self.uploads_playlist_id(channel_id).await?;
        self.playlist_videos(&uploads, cap).await
    }

    /// Distinct ids of the resources matching `query`, in result order.
    ///
    /// Fails with [`UnknownKind`](crate::error::UnknownKind) if any result is of a kind we do
    /// not recognize.
    #[instrument(skip(self, search_type), fields(search_type = %search_type))]
    pub async fn search_ids(
        &self,
        query: &str,
        search_type: &SearchType,
        cap: Option<usize>,
    ) -> eyre::Result<Vec<String>> {
        let items = collect_all(paginate(&self.source, search::query(query, search_type), cap))
            .await
            .with_context(|| format!("search for {query:?}"))?;

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for item in &items {
            let hit = search::hit(item)?;
            if seen.insert(hit.id.clone()) {
                ids.push(hit.id);
            }
        }
        tracing::info!(results = items.len(), distinct = ids.len(), "searched");
        Ok(ids)
    }

    /// Normalized search results for `query`, one per distinct resource.
    pub async fn search_records(
        &self,
        query: &str,
        search_type: &SearchType,
        cap: Option<usize>,
    ) -> eyre::Result<Vec<Record>> {
        let items = paginate(&self.source, search::query(query, search_type), cap);
        let items = collect_unique(items, |item| search::SCHEMA.id_of(item))
            .await
            .with_context(|| format!("search for {query:?}"))?;
        for item in &items {
            search::hit(item)?;
        }
        Ok(normalize_all(&search::SCHEMA, &items))
    }

    /// Top-level comments on a video.
    #[instrument(skip(self))]
    pub async fn comment_records(
        &self,
        video_id: &str,
        cap: Option<usize>,
    ) -> eyre::Result<Vec<Record>> {
        let items = paginate(&self.source, comments::for_video(video_id), cap);
        let items = collect_unique(items, |item| comments::SCHEMA.id_of(item))
            .await
            .with_context(|| format!("list comments on video {video_id}"))?;
        tracing::info!(video_id, comments = items.len(), "listed comments");
        Ok(normalize_all(&comments::SCHEMA, &items))
    }

    /// Keeps the channel records that pass every filter in `filters`.
    ///
    /// Recent-activity filters cost one request per channel that passes the other filters.
    pub async fn filter_channels(
        &self,
        records: Vec<Record>,
        filters: &FilterSet,
    ) -> eyre::Result<Vec<Record>> {
        for predicate in filters.predicates() {
            tracing::debug!(%predicate, "filtering channels");
        }
        filters.apply(records, self).await
    }

    /// When the newest video in an uploads playlist was published.
    ///
    /// `Ok(None)` for an empty playlist. YouTube answers `404` for the uploads playlist of a
    /// channel that never uploaded, which also counts as empty.
    #[instrument(skip(self), ret, level = tracing::Level::DEBUG)]
    pub async fn latest_upload(&self, uploads_playlist_id: &str) -> eyre::Result<Option<Timestamp>> {
        let page = match self
            .source
            .list_page(&playlist_items::latest(uploads_playlist_id), None)
            .await
        {
            Ok(page) => page,
            Err(e) if e
                .downcast_ref::<ApiError>()
                .is_some_and(|api| api.status == StatusCode::NOT_FOUND) =>
            {
                return Ok(None);
            }
            Err(e) => {
                return Err(e.wrap_err(format!("look up latest upload in {uploads_playlist_id}")));
            }
        };
        Ok(page.items.front().and_then(playlist_items::video_published_at))
    }
}

impl<S> LatestActivity for Harvester<S>
where
    S: ListResources + Sync,
{
    async fn latest_activity(&self, record: &Record) -> eyre::Result<Option<Timestamp>> {
        match record.get("uploads_playlist_id") {
            Some(uploads) if !uploads.is_empty() => self.latest_upload(uploads).await,
            _ => Ok(None),
        }
    }
}

fn normalize_all(schema: &Schema, items: &[Value]) -> Vec<Record> {
    items.iter().map(|item| schema.normalize(item)).collect()
}

/// Logs the ids the API did not return anything for (deleted, private, or mistyped).
fn report_missing(schema: &Schema, requested: &[String], items: &[Value]) {
    let found: HashSet<String> = items.iter().filter_map(|item| schema.id_of(item)).collect();
    let missing: IndexSet<&str> = requested
        .iter()
        .filter(|id| !found.contains(*id))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        tracing::info!(
            resource = schema.name,
            count = missing.len(),
            ids = ?missing,
            "some ids were not found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnknownKind;
    use crate::filter::{HiddenSubscribers, Predicate};
    use crate::testing::{MockSource, param, requested_ids};
    use crate::youtube_api::{Endpoint, ListRequest, Page, ResourceKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn playlist_item(video_id: &str) -> Value {
        json!({
            "snippet": { "title": format!("video {video_id}"), "resourceId": { "videoId": video_id } },
            "contentDetails": { "videoId": video_id }
        })
    }

    fn video(id: &str) -> Value {
        json!({
            "id": id,
            "snippet": { "title": format!("video {id}"), "publishedAt": "2024-01-01T00:00:00Z" },
            "contentDetails": { "duration": "PT1M" },
            "statistics": { "viewCount": "10" }
        })
    }

    /// A channel `UC1` whose uploads playlist `UU1` holds videos `1..=120` over three pages.
    fn channel_with_uploads(request: &ListRequest, token: Option<&str>) -> eyre::Result<Page> {
        match request.endpoint {
            Endpoint::Channels => Ok(Page::new(
                [json!({
                    "id": "UC1",
                    "contentDetails": { "relatedPlaylists": { "uploads": "UU1" } }
                })],
                None,
            )),
            Endpoint::PlaylistItems => {
                assert_eq!(param(request, "playlistId"), Some("UU1"));
                let (range, next) = match token {
                    None => (1..=50, Some("p2")),
                    Some("p2") => (51..=100, Some("p3")),
                    Some("p3") => (101..=120, None),
                    Some(other) => eyre::bail!("bad token {other}"),
                };
                let items = range.map(|n| playlist_item(&n.to_string())).collect::<Vec<_>>();
                Ok(Page::new(items, next.map(str::to_string)))
            }
            Endpoint::Videos => {
                let items = requested_ids(request).iter().map(|id| video(id)).collect::<Vec<_>>();
                Ok(Page::new(items, None))
            }
            other => eyre::bail!("unexpected endpoint {other:?}"),
        }
    }

    #[tokio::test]
    async fn channel_videos_end_to_end() {
        let harvester = Harvester::new(MockSource::new(channel_with_uploads));
        let records = harvester.channel_videos("UC1", None).await.unwrap();

        let ids: Vec<_> = records.iter().filter_map(|r| r.get("video_id")).collect();
        let expected: Vec<_> = (1..=120).map(|n| n.to_string()).collect();
        assert_eq!(ids, expected);
        assert_eq!(records[0].get("duration"), Some("60"));
        assert_eq!(records[0].get("likes"), Some("0"));

        let endpoints: Vec<_> = harvester
            .source()
            .calls()
            .into_iter()
            .map(|(request, _)| request.endpoint)
            .collect();
        assert_eq!(
            endpoints,
            vec![
                Endpoint::Channels,
                Endpoint::PlaylistItems,
                Endpoint::PlaylistItems,
                Endpoint::PlaylistItems,
                Endpoint::Videos,
                Endpoint::Videos,
                Endpoint::Videos,
            ]
        );
    }

    #[tokio::test]
    async fn capped_playlist() {
        let harvester = Harvester::new(MockSource::new(channel_with_uploads));
        let ids = harvester.playlist_video_ids("UU1", Some(75)).await.unwrap();
        assert_eq!(ids.len(), 100);
    }

    #[tokio::test]
    async fn unknown_channel() {
        let harvester = Harvester::new(MockSource::new(|_, _| Ok(Page::new(Vec::new(), None))));
        let err = harvester.uploads_playlist_id("UCnope").await.unwrap_err();
        assert!(err.to_string().contains("UCnope"));
    }

    #[tokio::test]
    async fn missing_videos_are_skipped() {
        let harvester = Harvester::new(MockSource::new(|request, _| {
            let items = requested_ids(request)
                .iter()
                .filter(|id| id.as_str() != "gone")
                .map(|id| video(id))
                .collect::<Vec<_>>();
            Ok(Page::new(items, None))
        }));
        let ids = vec!["a".to_string(), "gone".to_string(), "b".to_string()];
        let records = harvester.video_records(&ids).await.unwrap();
        let ids: Vec<_> = records.iter().filter_map(|r| r.get("video_id")).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    fn search_results(_: &ListRequest, token: Option<&str>) -> eyre::Result<Page> {
        let channel = |id: &str| json!({ "id": { "kind": "youtube#channel", "channelId": id }, "snippet": { "title": id } });
        Ok(match token {
            None => Page::new([channel("UC1"), channel("UC2")], Some("next".to_string())),
            Some(_) => Page::new([channel("UC2"), channel("UC3")], None),
        })
    }

    #[tokio::test]
    async fn search_ids_are_distinct() {
        let harvester = Harvester::new(MockSource::new(search_results));
        let ids = harvester
            .search_ids("rust", &SearchType::from(ResourceKind::Channel), None)
            .await
            .unwrap();
        assert_eq!(ids, vec!["UC1", "UC2", "UC3"]);

        let (request, _) = &harvester.source().calls()[0];
        assert_eq!(param(request, "type"), Some("channel"));
        assert_eq!(param(request, "q"), Some("rust"));

        let harvester = Harvester::new(MockSource::new(search_results));
        let records = harvester
            .search_records("rust", &SearchType::default(), None)
            .await
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].get("title"), Some("UC3"));
    }

    #[tokio::test]
    async fn unknown_search_kind_is_fatal() {
        let harvester = Harvester::new(MockSource::new(|_, _| {
            Ok(Page::new(
                [
                    json!({ "id": { "kind": "youtube#video", "videoId": "v1" } }),
                    json!({ "id": { "kind": "youtube#podcast", "podcastId": "x" } }),
                ],
                None,
            ))
        }));
        let err = harvester
            .search_ids("rust", &SearchType::default(), None)
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnknownKind>().map(|e| e.kind.as_str()),
            Some("youtube#podcast")
        );
    }

    #[tokio::test]
    async fn comments_on_a_video() {
        let harvester = Harvester::new(MockSource::new(|request, _| {
            assert_eq!(param(request, "videoId"), Some("v1"));
            Ok(Page::new(
                [json!({
                    "id": "c1",
                    "snippet": {
                        "videoId": "v1",
                        "topLevelComment": { "snippet": { "authorDisplayName": "a", "textDisplay": "hi" } }
                    }
                })],
                None,
            ))
        }));
        let records = harvester.comment_records("v1", Some(100)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("text"), Some("hi"));
        assert_eq!(records[0].get("replies"), Some("0"));
    }

    fn channel(id: &str, subscribers: &str, uploads: &str) -> Record {
        Record::from_iter([
            ("channel_id", id),
            ("subscribers", subscribers),
            ("hidden_subscriber_count", "false"),
            ("total_videos", "10"),
            ("uploads_playlist_id", uploads),
        ])
    }

    #[tokio::test]
    async fn filter_channels_by_recent_uploads() {
        let harvester = Harvester::new(MockSource::new(|request, _| {
            assert_eq!(request.max_results, 1);
            let published = match param(request, "playlistId") {
                Some("UUactive") => "2024-06-25T10:00:00Z",
                Some("UUstale") => "2023-01-01T00:00:00Z",
                Some("UUempty") => return Ok(Page::new(Vec::new(), None)),
                Some("UUgone") => {
                    return Err(ApiError {
                        endpoint: "playlistItems".to_string(),
                        status: StatusCode::NOT_FOUND,
                        reason: Some("playlistNotFound".to_string()),
                        message: "not found".to_string(),
                    }
                    .into());
                }
                other => panic!("unexpected playlist {other:?}"),
            };
            Ok(Page::new(
                [json!({ "contentDetails": { "videoId": "v", "videoPublishedAt": published } })],
                None,
            ))
        }));

        let records = vec![
            channel("active", "5000", "UUactive"),
            channel("stale", "5000", "UUstale"),
            channel("empty", "5000", "UUempty"),
            channel("gone", "5000", "UUgone"),
            channel("no-playlist", "5000", ""),
            channel("small-but-active", "10", "UUactive"),
        ];
        let filters = FilterSet::new()
            .with(Predicate::SubscriberRange {
                min: 1_000,
                max: 100_000,
                hidden: HiddenSubscribers::Include,
            })
            .with(Predicate::active_within_days(30))
            .at("2024-06-30T00:00:00Z".parse().unwrap());
        let kept = harvester.filter_channels(records, &filters).await.unwrap();

        let ids: Vec<_> = kept.iter().filter_map(|r| r.get("channel_id")).collect();
        assert_eq!(ids, vec!["active"]);
        // one lookup per channel with a playlist that passed the subscriber range
        assert_eq!(harvester.source().call_count(), 4);
    }

    #[tokio::test]
    async fn latest_upload_errors_other_than_not_found_propagate() {
        let harvester = Harvester::new(MockSource::new(|_, _| {
            Err(ApiError {
                endpoint: "playlistItems".to_string(),
                status: StatusCode::FORBIDDEN,
                reason: Some("quotaExceeded".to_string()),
                message: "quota".to_string(),
            }
            .into())
        }));
        let err = harvester.latest_upload("UU1").await.unwrap_err();
        assert!(err.downcast_ref::<ApiError>().unwrap().is_quota_exceeded());
    }

    #[tokio::test]
    async fn playlist_items_without_video_lookups() {
        let harvester = Harvester::new(MockSource::new(channel_with_uploads));
        let records = harvester.playlist_item_records("UU1", None).await.unwrap();

        assert_eq!(records.len(), 120);
        assert_eq!(records[0].get("video_id"), Some("1"));
        assert_eq!(records[0].get("title"), Some("video 1"));
        assert_eq!(records[119].get("video_id"), Some("120"));
        assert!(
            harvester
                .source()
                .calls()
                .iter()
                .all(|(request, _)| request.endpoint == Endpoint::PlaylistItems)
        );
        assert_eq!(harvester.source().call_count(), 3);
    }

    #[tokio::test]
    async fn latest_upload_falls_back_to_snippet_time() {
        let harvester = Harvester::new(MockSource::new(|request, _| {
            assert_eq!(request.part, "snippet,contentDetails");
            Ok(Page::new(
                [json!({
                    "snippet": { "publishedAt": "2024-06-20T09:00:00Z" },
                    "contentDetails": { "videoId": "v" }
                })],
                None,
            ))
        }));
        assert_eq!(
            harvester.latest_upload("UU1").await.unwrap(),
            Some("2024-06-20T09:00:00Z".parse().unwrap())
        );

        let filters = FilterSet::new()
            .with(Predicate::active_within_days(30))
            .at("2024-06-30T00:00:00Z".parse().unwrap());
        let kept = harvester
            .filter_channels(vec![channel("recent", "5000", "UU1")], &filters)
            .await
            .unwrap();
        assert_eq!(kept.len(), 1);
    }
}

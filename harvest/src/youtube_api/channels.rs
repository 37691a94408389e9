//! YouTube Channels API requests and the channel record schema.

use crate::normalize::{Field, FieldKind, Schema, lookup};
use crate::youtube_api::client::YouTubeClient;
use crate::youtube_api::types::{Endpoint, ListRequest};
use eyre::Context;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::instrument;

/// Parts needed to fill every column of [`SCHEMA`].
pub const PARTS: &str = "snippet,statistics,contentDetails,brandingSettings";

/// `channels.list` for up to 50 channel ids.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels/list>
pub fn by_ids(ids: &[String]) -> ListRequest {
    ListRequest::new(Endpoint::Channels, PARTS)
        .param("id", ids.join(","))
        .max_results(ids.len() as u32)
}

/// `channels.list` asking only for the related playlists of one channel.
pub fn content_details(channel_id: &str) -> ListRequest {
    ListRequest::new(Endpoint::Channels, "contentDetails")
        .param("id", channel_id)
        .max_results(1)
}

/// The playlist that holds every public upload of the channel.
pub fn uploads_playlist_id(item: &Value) -> Option<&str> {
    lookup(item, "contentDetails.relatedPlaylists.uploads")?
        .as_str()
        .filter(|id| !id.is_empty())
}

pub static SCHEMA: Schema = Schema {
    name: "channel",
    id_column: "channel_id",
    fields: &[
        Field::text("channel_id", &["id"]),
        Field::new(
            "custom_url",
            FieldKind::Url("www.youtube.com/c/{}"),
            &["snippet.customUrl"],
        )
        .or("NaN"),
        Field::new(
            "channel_url",
            FieldKind::Url("www.youtube.com/channel/{}"),
            &["id"],
        ),
        Field::text("title", &["snippet.title"]),
        Field::text("subscribers", &["statistics.subscriberCount"]).or("0"),
        Field::text(
            "hidden_subscriber_count",
            &["statistics.hiddenSubscriberCount"],
        )
        .or("false"),
        Field::text("country", &["snippet.country"]).or("NaN"),
        Field::new("email", FieldKind::Constant(""), &[]),
        Field::new("created_on", FieldKind::Date, &["snippet.publishedAt"]),
        Field::text("total_videos", &["statistics.videoCount"]).or("0"),
        Field::text("total_views", &["statistics.viewCount"]).or("0"),
        Field::text(
            "uploads_playlist_id",
            &["contentDetails.relatedPlaylists.uploads"],
        ),
    ],
};

static CHANNEL_ID_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+itemprop="(?:channelId|identifier)"\s+content="(UC[\w-]{22})""#)
        .expect("channel id meta pattern is valid")
});

/// Reads the channel id out of a channel page's `<meta itemprop="channelId">` tag.
pub fn channel_id_from_html(html: &str) -> Option<String> {
    CHANNEL_ID_META
        .captures(html)
        .map(|c| c[1].to_string())
}

impl YouTubeClient {
    /// Finds the channel id behind a channel link such as `https://www.youtube.com/@handle`.
    ///
    /// This scrapes the public channel page rather than using the API, so it costs no quota.
    #[instrument(skip(self), ret)]
    pub async fn resolve_channel_id(&self, channel_url: &str) -> eyre::Result<String> {
        let html = self
            .http_client()
            .get(channel_url)
            .send()
            .await
            .with_context(|| format!("fetch channel page {channel_url}"))?
            .error_for_status()
            .with_context(|| format!("fetch channel page {channel_url}"))?
            .text()
            .await
            .context("read channel page body")?;

        channel_id_from_html(&html)
            .ok_or_else(|| eyre::eyre!("no channel id found on {channel_url}"))
    }
}

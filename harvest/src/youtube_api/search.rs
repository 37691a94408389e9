//! YouTube Search API requests, result kinds, and the search result schema.

use crate::error::{InvalidKeyword, UnknownKind};
use crate::normalize::{Field, FieldKind, Schema, lookup};
use crate::youtube_api::types::{Endpoint, ListRequest};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// What a search result points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Video,
    Channel,
    Playlist,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Video, Self::Channel, Self::Playlist];
    const KEYWORDS: &'static [&'static str] = &["video", "channel", "playlist"];

    /// The keyword used in the `type` search parameter.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Channel => "channel",
            Self::Playlist => "playlist",
        }
    }

    /// Maps the `id.kind` discriminator of a search result, e.g. `youtube#video`.
    pub fn from_api_kind(kind: &str) -> Option<Self> {
        match kind {
            "youtube#video" => Some(Self::Video),
            "youtube#channel" => Some(Self::Channel),
            "youtube#playlist" => Some(Self::Playlist),
            _ => None,
        }
    }

    /// Which member of a search result's `id` object carries the id for this kind.
    fn id_field(self) -> &'static str {
        match self {
            Self::Video => "videoId",
            Self::Channel => "channelId",
            Self::Playlist => "playlistId",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for ResourceKind {
    type Err = InvalidKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.keyword().eq_ignore_ascii_case(s))
            .ok_or_else(|| InvalidKeyword {
                what: "search type",
                given: s.to_string(),
                accepted: Self::KEYWORDS,
            })
    }
}

/// The set of resource kinds a search is restricted to.
///
/// Parsed from a comma-separated list such as `video,channel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchType {
    kinds: Vec<ResourceKind>,
}

impl SearchType {
    pub fn new(kinds: impl IntoIterator<Item = ResourceKind>) -> Self {
        let mut unique = Vec::new();
        for kind in kinds {
            if !unique.contains(&kind) {
                unique.push(kind);
            }
        }
        Self { kinds: unique }
    }

    pub fn kinds(&self) -> &[ResourceKind] {
        &self.kinds
    }

    pub fn as_param(&self) -> String {
        self.kinds
            .iter()
            .map(|k| k.keyword())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Default for SearchType {
    fn default() -> Self {
        Self::new(ResourceKind::ALL)
    }
}

impl From<ResourceKind> for SearchType {
    fn from(kind: ResourceKind) -> Self {
        Self { kinds: vec![kind] }
    }
}

impl FromStr for SearchType {
    type Err = InvalidKeyword;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kinds = s
            .split(',')
            .map(ResourceKind::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(kinds))
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_param())
    }
}

/// `search.list` for `query`, restricted to `search_type`.
///
/// Every page costs 100 quota units, so callers should pass a cap.
///
/// See: <https://developers.google.com/youtube/v3/docs/search/list>
pub fn query(query: &str, search_type: &SearchType) -> ListRequest {
    ListRequest::new(Endpoint::Search, "snippet")
        .param("q", query)
        .param("type", search_type.as_param())
}

/// The kind and id of one search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub kind: ResourceKind,
    pub id: String,
}

/// Reads the discriminated id out of a search result.
///
/// An `id.kind` we do not recognize, or none at all, is an [`UnknownKind`] error.
pub fn hit(item: &Value) -> eyre::Result<SearchHit> {
    let api_kind = lookup(item, "id.kind")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let kind = ResourceKind::from_api_kind(api_kind).ok_or_else(|| UnknownKind {
        kind: api_kind.to_string(),
    })?;
    let id = item
        .get("id")
        .and_then(|id| id.get(kind.id_field()))
        .and_then(Value::as_str)
        .ok_or_else(|| eyre::eyre!("{api_kind} search result has no id.{}", kind.id_field()))?;
    Ok(SearchHit {
        kind,
        id: id.to_string(),
    })
}

pub static SCHEMA: Schema = Schema {
    name: "search result",
    id_column: "id",
    fields: &[
        Field::text("kind", &["id.kind"]),
        Field::text("id", &["id.videoId", "id.channelId", "id.playlistId"]),
        Field::text("title", &["snippet.title"]),
        Field::text("channel_id", &["snippet.channelId"]),
        Field::new("published_at", FieldKind::Date, &["snippet.publishedAt"]),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parse_search_type() {
        let t: SearchType = "video, channel".parse().unwrap();
        assert_eq!(t.kinds(), &[ResourceKind::Video, ResourceKind::Channel]);
        assert_eq!(t.as_param(), "video,channel");

        let t: SearchType = "Playlist,playlist".parse().unwrap();
        assert_eq!(t.kinds(), &[ResourceKind::Playlist]);

        assert_eq!(SearchType::default().as_param(), "video,channel,playlist");
    }

    #[test]
    fn invalid_search_type() {
        let err = "video,podcast".parse::<SearchType>().unwrap_err();
        assert_eq!(err.given, "podcast");
        assert_eq!(err.accepted, &["video", "channel", "playlist"]);
        assert!(err.to_string().contains("video, channel, playlist"));
    }

    #[test]
    fn hits_by_kind() {
        let video = json!({ "id": { "kind": "youtube#video", "videoId": "v1" } });
        let channel = json!({ "id": { "kind": "youtube#channel", "channelId": "UC1" } });
        let playlist = json!({ "id": { "kind": "youtube#playlist", "playlistId": "PL1" } });
        assert_eq!(
            hit(&video).unwrap(),
            SearchHit {
                kind: ResourceKind::Video,
                id: "v1".to_string()
            }
        );
        assert_eq!(hit(&channel).unwrap().id, "UC1");
        assert_eq!(hit(&playlist).unwrap().kind, ResourceKind::Playlist);
    }

    #[test]
    fn unknown_kind_is_distinct() {
        let item = json!({ "id": { "kind": "youtube#short", "shortId": "s1" } });
        let err = hit(&item).unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnknownKind>(),
            Some(&UnknownKind {
                kind: "youtube#short".to_string()
            })
        );

        let err = hit(&json!({ "snippet": {} })).unwrap_err();
        assert!(err.downcast_ref::<UnknownKind>().is_some());
    }

    #[test]
    fn search_request() {
        let request = query("rust async", &SearchType::from(ResourceKind::Channel));
        assert_eq!(request.endpoint, Endpoint::Search);
        assert_eq!(
            request.params,
            vec![
                ("q", "rust async".to_string()),
                ("type", "channel".to_string())
            ]
        );
    }

    #[test]
    fn search_record() {
        let item = json!({
            "kind": "youtube#searchResult",
            "id": { "kind": "youtube#channel", "channelId": "UC1" },
            "snippet": { "title": "Rustaceans", "channelId": "UC1", "publishedAt": "2020-01-02T03:04:05Z" }
        });
        assert_eq!(
            SCHEMA.normalize(&item).iter().collect::<Vec<_>>(),
            vec![
                ("kind", "youtube#channel"),
                ("id", "UC1"),
                ("title", "Rustaceans"),
                ("channel_id", "UC1"),
                ("published_at", "2020-01-02"),
            ]
        );
    }
}

//! YouTube PlaylistItems API requests and the playlist item record schema.

use crate::normalize::{Field, FieldKind, Schema};
use crate::youtube_api::types::{Endpoint, ListRequest};
use jiff::Timestamp;
use serde_json::Value;

/// Length of a full playlist id such as `PLxxxxxxxx…`.
const PLAYLIST_ID_LEN: usize = 34;

/// `playlistItems.list` for every item in a playlist, 50 per page.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems/list>
pub fn in_playlist(playlist_id: &str) -> ListRequest {
    ListRequest::new(Endpoint::PlaylistItems, "snippet,contentDetails")
        .param("playlistId", playlist_id)
}

/// `playlistItems.list` for only the first (most recent, for upload playlists) item.
pub fn latest(playlist_id: &str) -> ListRequest {
    ListRequest::new(Endpoint::PlaylistItems, "snippet,contentDetails")
        .param("playlistId", playlist_id)
        .max_results(1)
}

pub static SCHEMA: Schema = Schema {
    name: "playlist item",
    id_column: "video_id",
    fields: &[
        Field::text(
            "video_id",
            &["snippet.resourceId.videoId", "contentDetails.videoId"],
        ),
        Field::text("title", &["snippet.title"]),
        Field::new(
            "published_at",
            FieldKind::Date,
            &["contentDetails.videoPublishedAt"],
        ),
    ],
};

/// When the video behind a playlist item went public, or failing that, when it was added to
/// the playlist.
///
/// Private and deleted videos have no `videoPublishedAt`; for uploads the snippet's
/// `publishedAt` is the upload time.
pub fn video_published_at(item: &Value) -> Option<Timestamp> {
    ["contentDetails.videoPublishedAt", "snippet.publishedAt"]
        .into_iter()
        .find_map(|path| crate::normalize::lookup(item, path)?.as_str()?.parse().ok())
}

/// Accepts either a bare playlist id or any URL carrying one in its `list=` parameter.
pub fn extract_playlist_id(url_or_id: &str) -> Option<String> {
    let trimmed = url_or_id.trim().trim_matches('/');
    if !trimmed.contains(['/', '?', '=', '&']) {
        return (!trimmed.is_empty()).then(|| trimmed.to_string());
    }

    let (_, rest) = trimmed.split_once("list=")?;
    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if id.is_empty() {
        return None;
    }
    if id.len() != PLAYLIST_ID_LEN {
        tracing::debug!(playlist_id = %id, "playlist id has an unusual length");
    }
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn playlist_urls() {
        assert_eq!(
            extract_playlist_id(
                "https://www.youtube.com/playlist?list=PLBCF2DAC6FFB574DE&si=abc"
            ),
            Some("PLBCF2DAC6FFB574DE".to_string())
        );
        assert_eq!(
            extract_playlist_id(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI"
            ),
            Some("PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI".to_string())
        );
        assert_eq!(
            extract_playlist_id("PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI"),
            Some("PLFgquLnL59alCl_2TQvOiD5Vgm1hCaGSI".to_string())
        );
        assert_eq!(extract_playlist_id("https://www.youtube.com/watch?v=x"), None);
        assert_eq!(extract_playlist_id(""), None);
    }

    #[test]
    fn item_with_snippet_and_details() {
        let item = json!({
            "snippet": { "title": "Episode 1", "resourceId": { "kind": "youtube#video", "videoId": "v1" } },
            "contentDetails": { "videoId": "v1", "videoPublishedAt": "2024-03-01T12:00:00Z" }
        });
        let record = SCHEMA.normalize(&item);
        assert_eq!(record.get("video_id"), Some("v1"));
        assert_eq!(record.get("published_at"), Some("2024-03-01"));
        assert_eq!(
            video_published_at(&item),
            Some("2024-03-01T12:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn private_video_has_no_publish_time() {
        let item = json!({ "contentDetails": { "videoId": "v2" } });
        assert_eq!(SCHEMA.id_of(&item), Some("v2".to_string()));
        assert_eq!(video_published_at(&item), None);
    }

    #[test]
    fn publish_time_falls_back_to_snippet() {
        let item = json!({
            "snippet": { "publishedAt": "2024-05-02T08:30:00Z", "resourceId": { "videoId": "v3" } },
            "contentDetails": { "videoId": "v3" }
        });
        assert_eq!(
            video_published_at(&item),
            Some("2024-05-02T08:30:00Z".parse().unwrap())
        );

        let item = json!({
            "snippet": { "publishedAt": "2024-05-02T08:30:00Z" },
            "contentDetails": { "videoId": "v3", "videoPublishedAt": "2024-05-01T00:00:00Z" }
        });
        assert_eq!(
            video_published_at(&item),
            Some("2024-05-01T00:00:00Z".parse().unwrap())
        );
    }

    #[test]
    fn latest_asks_for_snippet_too() {
        let request = latest("UU1");
        assert_eq!(request.part, "snippet,contentDetails");
        assert_eq!(request.max_results, 1);
    }
}

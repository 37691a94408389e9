//! YouTube CommentThreads API requests and the comment record schema.

use crate::normalize::{Field, FieldKind, Schema};
use crate::youtube_api::types::{Endpoint, ListRequest};

/// `commentThreads.list` for the top-level comments of one video.
///
/// Fails with `403 commentsDisabled` for videos that have comments turned off.
///
/// See: <https://developers.google.com/youtube/v3/docs/commentThreads/list>
pub fn for_video(video_id: &str) -> ListRequest {
    ListRequest::new(Endpoint::CommentThreads, "snippet")
        .param("videoId", video_id)
        .param("textFormat", "plainText")
}

pub static SCHEMA: Schema = Schema {
    name: "comment",
    id_column: "comment_id",
    fields: &[
        Field::text("comment_id", &["id"]),
        Field::text("video_id", &["snippet.videoId", "snippet.topLevelComment.snippet.videoId"]),
        Field::text("author", &["snippet.topLevelComment.snippet.authorDisplayName"]),
        Field::text("text", &["snippet.topLevelComment.snippet.textDisplay"]),
        Field::text("likes", &["snippet.topLevelComment.snippet.likeCount"]).or("0"),
        Field::text("replies", &["snippet.totalReplyCount"]).or("0"),
        Field::new(
            "published_at",
            FieldKind::Date,
            &["snippet.topLevelComment.snippet.publishedAt"],
        ),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn comment_thread_record() {
        let item = json!({
            "kind": "youtube#commentThread",
            "id": "UgzAbc",
            "snippet": {
                "videoId": "v1",
                "totalReplyCount": 4,
                "topLevelComment": {
                    "id": "UgzAbc",
                    "snippet": {
                        "authorDisplayName": "@someone",
                        "textDisplay": "first!",
                        "likeCount": 12,
                        "publishedAt": "2023-05-06T07:08:09Z"
                    }
                }
            }
        });
        assert_eq!(
            SCHEMA.normalize(&item).iter().collect::<Vec<_>>(),
            vec![
                ("comment_id", "UgzAbc"),
                ("video_id", "v1"),
                ("author", "@someone"),
                ("text", "first!"),
                ("likes", "12"),
                ("replies", "4"),
                ("published_at", "2023-05-06"),
            ]
        );
    }

    #[test]
    fn request_uses_plain_text() {
        let request = for_video("v1");
        assert_eq!(request.endpoint, Endpoint::CommentThreads);
        assert!(request.params.contains(&("textFormat", "plainText".to_string())));
    }
}

//! YouTube Videos API requests and the video record schema.

use crate::normalize::{Field, FieldKind, Schema};
use crate::youtube_api::types::{Endpoint, ListRequest};

/// `videos.list` for up to 50 video ids.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
pub fn by_ids(ids: &[String]) -> ListRequest {
    ListRequest::new(Endpoint::Videos, "contentDetails,snippet,statistics")
        .param("id", ids.join(","))
        .max_results(ids.len() as u32)
}

pub static SCHEMA: Schema = Schema {
    name: "video",
    id_column: "video_id",
    fields: &[
        Field::text("video_id", &["id"]),
        Field::text("title", &["snippet.title"]),
        Field::new("date", FieldKind::Date, &["snippet.publishedAt"]),
        Field::text("views", &["statistics.viewCount"]).or("0"),
        Field::new(
            "url",
            FieldKind::Url("https://www.youtube.com/watch?v={}"),
            &["id"],
        ),
        Field::new("duration", FieldKind::Duration, &["contentDetails.duration"]).or("0"),
        Field::text("likes", &["statistics.likeCount"]).or("0"),
        // only visible to the video's owner since late 2021
        Field::text("dislikes", &["statistics.dislikeCount"]).or("0"),
        Field::text("comments", &["statistics.commentCount"]).or("0"),
    ],
};

//! Error kinds that callers may want to tell apart.
//!
//! Everything in this crate returns [`eyre::Result`]. The types here end up inside the
//! [`eyre::Report`] and can be recovered with [`eyre::Report::downcast_ref`], e.g. to notice
//! that YouTube started returning a search result kind we do not know about.

use http::StatusCode;

/// A YouTube Data API request came back with a non-success status.
///
/// Transport and authorization failures are never retried; they surface to the caller as-is.
#[derive(Debug, thiserror::Error)]
#[error("YouTube API request to {endpoint} failed with status {status}: {message}")]
pub struct ApiError {
    pub endpoint: String,
    pub status: StatusCode,
    /// The first `errors[].reason` of the error body, e.g. `quotaExceeded`.
    pub reason: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(
            self.reason.as_deref(),
            Some("quotaExceeded" | "rateLimitExceeded" | "dailyLimitExceeded")
        )
    }
}

/// A search result carried an `id.kind` discriminator we do not recognize.
///
/// This means the API contract changed under us, so it is always fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized resource kind `{kind}` in search results")]
pub struct UnknownKind {
    pub kind: String,
}

/// A user-supplied keyword (search type, hidden-subscriber policy, ...) was not one we accept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{given}` is not an acceptable {what}; acceptable values are: {}", .accepted.join(", "))]
pub struct InvalidKeyword {
    pub what: &'static str,
    pub given: String,
    pub accepted: &'static [&'static str],
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn invalid_keyword_lists_accepted_values() {
        let err = InvalidKeyword {
            what: "search type",
            given: "podcast".to_string(),
            accepted: &["video", "channel", "playlist"],
        };
        assert_eq!(
            err.to_string(),
            "`podcast` is not an acceptable search type; acceptable values are: video, channel, playlist"
        );
    }

    #[test]
    fn quota_reasons() {
        let mut err = ApiError {
            endpoint: "search".to_string(),
            status: StatusCode::FORBIDDEN,
            reason: Some("quotaExceeded".to_string()),
            message: "The request cannot be completed".to_string(),
        };
        assert!(err.is_quota_exceeded());
        err.reason = Some("forbidden".to_string());
        assert!(!err.is_quota_exceeded());
    }
}

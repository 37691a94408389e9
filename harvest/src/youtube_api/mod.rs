//! YouTube Data API v3 list endpoints.
//!
//! Every resource this crate reads (channels, playlist items, videos, search results and
//! comment threads) comes from a `*.list` endpoint with the same shape: a request carries a
//! `part` selector and filters, and the response carries up to 50 `items` plus an optional
//! `nextPageToken`. So there is only one RPC, [`ListResources::list_page`], and each resource
//! module contributes two things:
//!
//! - request builders returning a [`ListRequest`], and
//! - a [`Schema`](crate::normalize::Schema) describing how its items flatten into records.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tokio_stream::StreamExt;
//! use yt_harvest::youtube_api::{YouTubeClient, paginate, playlist_items};
//!
//! # async fn example() -> eyre::Result<()> {
//! let client = YouTubeClient::with_api_key("AIza...", reqwest::Client::new());
//! let items = paginate(&client, playlist_items::in_playlist("UUSJBJ3sP5GRUJMON12v28ew"), None);
//! let mut items = std::pin::pin!(items);
//! while let Some(item) = items.next().await {
//!     let record = playlist_items::SCHEMA.normalize(&item?);
//!     println!("{:?}", record.get("title"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod client;
pub mod comments;
pub mod playlist_items;
pub mod search;
pub mod types;
pub mod videos;

pub use client::{Credentials, YouTubeClient};
pub use search::{ResourceKind, SearchHit, SearchType};
pub use types::{Endpoint, ListRequest, ListResources, MAX_PAGE_SIZE, Page, PageInfo, PagedStream, paginate};

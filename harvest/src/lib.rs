//! Bulk extraction of YouTube channel, video, playlist, search and comment data into CSV.
//!
//! The pieces, bottom up:
//!
//! - [`youtube_api`] pages through the Data API's list endpoints,
//! - [`collector`] drains those pages into collections,
//! - [`normalize`] flattens raw items into [`Record`]s,
//! - [`filter`] narrows channel records down,
//! - [`harvest`] strings all of the above into complete extractions, and
//! - [`export`] writes the results out as CSV.

use crate::auth::{OAuthManager, TokenCache};
use crate::config::Config;
use eyre::Context;
use std::sync::Arc;

pub mod auth;
pub mod collector;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod harvest;
pub mod normalize;
pub mod youtube_api;

#[cfg(test)]
mod testing;

pub use filter::{FilterSet, HiddenSubscribers, Predicate};
pub use harvest::Harvester;
pub use normalize::Record;
pub use youtube_api::YouTubeClient;

/// Builds a client from `config` and checks that YouTube accepts its credentials.
///
/// With `use_oauth`, this goes through the OAuth flow (reusing the cached token when it can
/// still be refreshed, opening a browser otherwise); without it, the API key is used.
pub async fn connect(config: &Config, use_oauth: bool) -> eyre::Result<YouTubeClient> {
    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build HTTP client")?;

    let client = if use_oauth {
        let Some(credentials) = &config.oauth else {
            eyre::bail!(
                "OAuth requested but {} and {} are not set",
                crate::config::OAUTH_CLIENT_ID_VAR,
                crate::config::OAUTH_CLIENT_SECRET_VAR
            );
        };
        let manager = OAuthManager::new(credentials);
        let token = auth::authorize(&manager, &TokenCache::new(config.token_cache.clone()))
            .await
            .context("authorize with YouTube")?;
        YouTubeClient::with_oauth(token, Arc::new(manager), http)
    } else {
        let Some(api_key) = &config.api_key else {
            eyre::bail!(
                "{} is not set; set it or pass --oauth",
                crate::config::API_KEY_VAR
            );
        };
        YouTubeClient::with_api_key(api_key.clone(), http)
    };
    let client = client.with_api_base(config.api_base.clone());

    if !client
        .validate_credentials()
        .await
        .context("validate YouTube credentials")?
    {
        eyre::bail!("YouTube rejected the configured credentials");
    }
    Ok(client)
}

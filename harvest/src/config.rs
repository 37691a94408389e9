//! Runtime configuration, read from the environment (and a `.env` file if present).

use std::path::PathBuf;

pub const API_KEY_VAR: &str = "YOUTUBE_API_KEY";
pub const OAUTH_CLIENT_ID_VAR: &str = "YOUTUBE_OAUTH_CLIENT_ID";
pub const OAUTH_CLIENT_SECRET_VAR: &str = "YOUTUBE_OAUTH_CLIENT_SECRET";
pub const TOKEN_CACHE_VAR: &str = "YT_HARVEST_TOKEN_CACHE";
pub const API_BASE_VAR: &str = "YT_HARVEST_API_BASE";

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_TOKEN_CACHE: &str = "tokens.json";

/// Client credentials for the installed-application OAuth flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: Option<String>,
    pub oauth: Option<OAuthCredentials>,
    /// Where an OAuth token is cached between runs.
    pub token_cache: PathBuf,
    /// Base URL of the Data API; only overridden to point at a proxy or a local fake.
    pub api_base: String,
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> eyre::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from any key-value source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let oauth = match (get(OAUTH_CLIENT_ID_VAR), get(OAUTH_CLIENT_SECRET_VAR)) {
            (Some(client_id), Some(client_secret)) => Some(OAuthCredentials {
                client_id,
                client_secret,
            }),
            (None, None) => None,
            (Some(_), None) => eyre::bail!("{OAUTH_CLIENT_ID_VAR} is set but {OAUTH_CLIENT_SECRET_VAR} is not"),
            (None, Some(_)) => eyre::bail!("{OAUTH_CLIENT_SECRET_VAR} is set but {OAUTH_CLIENT_ID_VAR} is not"),
        };

        let api_key = get(API_KEY_VAR);
        if api_key.is_none() && oauth.is_none() {
            eyre::bail!(
                "no YouTube credentials configured; set {API_KEY_VAR} \
                 (or {OAUTH_CLIENT_ID_VAR} and {OAUTH_CLIENT_SECRET_VAR})"
            );
        }

        Ok(Self {
            api_key,
            oauth,
            token_cache: get(TOKEN_CACHE_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_CACHE)),
            api_base: get(API_BASE_VAR)
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }
}

//! HTTP client for the YouTube Data API v3 list endpoints.

use crate::auth::{OAuthManager, TimeBoundAccessToken};
use crate::config::DEFAULT_API_BASE;
use crate::error::ApiError;
use crate::youtube_api::types::{Endpoint, ListRequest, ListResources, Page};
use eyre::Context;
use http::{Method, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::instrument;

/// How requests prove who they are.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Sent as the `key` query parameter. Enough for all public data.
    ApiKey(String),
    /// Sent as a bearer token, refreshed whenever it is about to expire.
    OAuth {
        token: Arc<Mutex<TimeBoundAccessToken>>,
        manager: Arc<OAuthManager>,
    },
}

/// Client for the YouTube Data API v3.
///
/// Every call is a single request; nothing is retried and quota errors surface as
/// [`ApiError`]s.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    credentials: Credentials,
    client: reqwest::Client,
    api_base: String,
}

impl YouTubeClient {
    pub fn with_api_key(api_key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            credentials: Credentials::ApiKey(api_key.into()),
            client,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_oauth(
        token: TimeBoundAccessToken,
        manager: Arc<OAuthManager>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            credentials: Credentials::OAuth {
                token: Arc::new(Mutex::new(token)),
                manager,
            },
            client,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Points the client at a different API root, e.g. a caching proxy.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Returns an access token that is valid right now, refreshing it first if needed.
    async fn fresh_access_token(
        token: &Mutex<TimeBoundAccessToken>,
        manager: &OAuthManager,
    ) -> eyre::Result<String> {
        let mut token = token.lock().await;
        if token.is_expired(SystemTime::now()) {
            tracing::debug!("access token expired, refreshing");
            if !token.refresh(manager).await? {
                eyre::bail!("OAuth access token expired and could not be refreshed");
            }
        }
        Ok(token.secret().to_string())
    }

    /// Sends one authenticated GET to `endpoint` and checks the status code.
    #[instrument(skip(self, query), level = tracing::Level::TRACE)]
    pub(crate) async fn make_request(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
    ) -> eyre::Result<reqwest::Response> {
        let url = format!("{}/{}", self.api_base, endpoint.path());
        let mut request = self.client.request(Method::GET, &url).query(query);

        match &self.credentials {
            Credentials::ApiKey(key) => {
                request = request.query(&[("key", key)]);
            }
            Credentials::OAuth { token, manager } => {
                let access_token = Self::fresh_access_token(token, manager).await?;
                request = request.header("Authorization", format!("Bearer {access_token}"));
            }
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("send request to YouTube API: {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(api_error(endpoint, status, &body).into());
        }

        Ok(response)
    }

    /// Checks that the configured credentials are accepted, at a cost of one quota unit.
    ///
    /// Returns `Ok(false)` if the API rejects the request, and `Err` for transport failures.
    #[instrument(skip(self), ret)]
    pub async fn validate_credentials(&self) -> eyre::Result<bool> {
        let request = ListRequest::new(Endpoint::Videos, "id")
            .param("id", "dQw4w9WgXcQ")
            .max_results(1);
        match self.make_request(request.endpoint, &request.query(None)).await {
            Ok(_) => Ok(true),
            Err(e) => match e.downcast_ref::<ApiError>() {
                Some(api) => {
                    tracing::warn!(status = %api.status, reason = ?api.reason, "credentials rejected");
                    Ok(false)
                }
                None => Err(e),
            },
        }
    }
}

impl ListResources for YouTubeClient {
    #[instrument(skip(self, request), fields(endpoint = request.endpoint.path()))]
    async fn list_page(
        &self,
        request: &ListRequest,
        page_token: Option<String>,
    ) -> eyre::Result<Page> {
        let response = self
            .make_request(request.endpoint, &request.query(page_token.as_deref()))
            .await?;

        let page: Page = response
            .json()
            .await
            .with_context(|| format!("parse YouTube {} response as JSON", request.endpoint.path()))?;

        tracing::debug!(
            total_results = page.page_info.map(|p| p.total_results),
            returned_items = page.items.len(),
            has_next_page = page.next_cursor().is_some(),
            "fetched page"
        );

        Ok(page)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    reason: Option<String>,
}

/// Turns a failed response into an [`ApiError`], keeping the raw body if it is not Google's
/// usual error envelope.
fn api_error(endpoint: Endpoint, status: StatusCode, body: &str) -> ApiError {
    let (reason, message) = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => (
            error.errors.into_iter().find_map(|e| e.reason),
            error.message,
        ),
        Err(_) => (None, body.trim().to_string()),
    };
    ApiError {
        endpoint: endpoint.path().to_string(),
        status,
        reason,
        message,
    }
}

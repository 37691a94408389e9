//! OAuth 2.0 for installed applications, and a small on-disk token cache.
//!
//! Most harvesting only needs an API key. OAuth is here for users who would rather spend their
//! own account's quota, or who need to read resources an API key cannot see.

use crate::config::OAuthCredentials;
use eyre::Context;
use http_body_util::Full;
use hyper::body::{self, Bytes};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RevocationUrl, Scope, TokenResponse, TokenUrl, reqwest,
};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::net::TcpListener;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v3/token";
const REVOCATION_URL: &str = "https://oauth2.googleapis.com/revoke";
const READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// Refresh this long before Google says the token expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

const DONE_PAGE: &str = "<!doctype html><html><body>\
    <p>yt-harvest is now authorized. You can close this tab.</p>\
    </body></html>";
const REJECTED_PAGE: &str = "<!doctype html><html><body>\
    <p>Authorization was not completed. Please retry from the terminal.</p>\
    </body></html>";

/// An OAuth token together with the moment it stops being usable.
#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    expires_at: SystemTime,
}

impl TimeBoundAccessToken {
    /// Wraps a token that must be refreshed before first use, e.g. one read back from disk.
    pub fn expired(token: BasicTokenResponse) -> Self {
        Self {
            token,
            expires_at: SystemTime::UNIX_EPOCH,
        }
    }

    /// Wraps a token that was just issued.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: expiry_of(&token, SystemTime::now()),
            token,
        }
    }

    pub fn raw_token(&self) -> &BasicTokenResponse {
        &self.token
    }

    pub fn secret(&self) -> &str {
        self.token.access_token().secret()
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// Returns `Ok(false)` when Google no longer accepts the refresh token (or there is none),
    /// in which case the user has to go through [`OAuthManager::authenticate`] again.
    pub async fn refresh(&mut self, manager: &OAuthManager) -> eyre::Result<bool> {
        let Some(fresh) = manager
            .refresh_token(&self.token)
            .await
            .context("refresh OAuth token")?
        else {
            return Ok(false);
        };

        let previous = std::mem::replace(&mut self.token, fresh);
        // Google usually omits the refresh token on refresh; keep using the one we have.
        if self.token.refresh_token().is_none() {
            self.token
                .set_refresh_token(previous.refresh_token().cloned());
        }
        self.expires_at = expiry_of(&self.token, SystemTime::now());
        Ok(true)
    }
}

fn expiry_of(token: &BasicTokenResponse, issued_at: SystemTime) -> SystemTime {
    match token.expires_in() {
        Some(lifetime) => issued_at + lifetime.saturating_sub(EXPIRY_MARGIN),
        // Google access tokens live for an hour.
        None => issued_at + Duration::from_secs(3600) - EXPIRY_MARGIN,
    }
}

/// Runs OAuth flows against Google with the configured client credentials.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    client_id: String,
    client_secret: String,
}

impl OAuthManager {
    pub fn new(credentials: &OAuthCredentials) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
        }
    }

    /// Sends the user through the browser consent screen and returns the issued token.
    ///
    /// A one-shot HTTP listener on a random localhost port receives the redirect.
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind OAuth redirect listener")?;
        let addr = listener
            .local_addr()
            .context("get OAuth redirect listener address")?;
        let redirect_url = RedirectUrl::new(format!("http://{addr}"))
            .context("construct OAuth redirect url")?;

        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(AUTH_URL.to_string()).context("parse auth url")?)
            .set_token_uri(TokenUrl::new(TOKEN_URL.to_string()).context("parse token url")?)
            .set_revocation_url(
                RevocationUrl::new(REVOCATION_URL.to_string()).context("parse revocation url")?,
            )
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (consent_url, csrf) = client
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new(READONLY_SCOPE.to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %consent_url, "asking user to complete OAuth consent in the browser");
        webbrowser::open(consent_url.as_str()).context("open user's browser")?;

        let code = receive_authorization_code(listener, csrf)
            .await
            .context("await OAuth authorization code")?;

        let token = client
            .exchange_code(code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client()?)
            .await
            .context("exchange authorization code for access token")?;

        tracing::debug!("obtained OAuth token");
        Ok(token)
    }

    /// Returns `Ok(None)` if there is no refresh token or Google rejects it as an invalid grant.
    pub async fn refresh_token(
        &self,
        token: &BasicTokenResponse,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("cached OAuth token has no refresh token");
            return Ok(None);
        };

        let client = BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_token_uri(TokenUrl::new(TOKEN_URL.to_string()).context("parse token url")?);

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&http_client()?)
            .await
        {
            Ok(fresh) => {
                tracing::debug!("refreshed OAuth token");
                Ok(Some(fresh))
            }
            Err(oauth2::RequestTokenError::ServerResponse(ref response))
                if matches!(
                    response.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("refresh token is no longer valid");
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

fn http_client() -> eyre::Result<reqwest::Client> {
    reqwest::ClientBuilder::new()
        // token endpoints never need to redirect us anywhere
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("build OAuth HTTP client")
}

/// Serves the single redirect request from the consent screen and returns its `code`.
async fn receive_authorization_code(
    listener: TcpListener,
    csrf: CsrfToken,
) -> eyre::Result<AuthorizationCode> {
    let (stream, _) = listener
        .accept()
        .await
        .context("accept OAuth redirect connection")?;
    let io = hyper_util::rt::TokioIo::new(stream);

    let (code_tx, mut code_rx) = tokio::sync::mpsc::channel(1);
    let service = service_fn(move |req: Request<body::Incoming>| {
        let code_tx = code_tx.clone();
        let expected_state = csrf.secret().clone();
        async move {
            let mut state = None;
            let mut code = None;
            for (key, value) in form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
            {
                match &*key {
                    "state" => state = Some(value.into_owned()),
                    "code" => code = Some(value.into_owned()),
                    _ => {}
                }
            }

            let page = match code {
                Some(code) if state.as_deref() == Some(expected_state.as_str()) => {
                    let _ = code_tx.send(AuthorizationCode::new(code)).await;
                    DONE_PAGE
                }
                _ => {
                    tracing::warn!("OAuth redirect had a missing code or mismatched state");
                    REJECTED_PAGE
                }
            };
            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(page.as_bytes()))))
        }
    });

    let mut connection = std::pin::pin!(http1::Builder::new().serve_connection(io, service));
    tokio::select! {
        biased;
        code = code_rx.recv() => {
            connection.as_mut().graceful_shutdown();
            // let the confirmation page reach the browser
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "OAuth redirect connection ended uncleanly");
            }
            code.ok_or_else(|| eyre::eyre!("OAuth redirect handler dropped"))
        }
        served = &mut connection => {
            served.context("serve OAuth redirect")?;
            eyre::bail!("OAuth redirect connection closed without an authorization code")
        }
    }
}

/// Where the OAuth token is kept between runs.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> eyre::Result<Option<BasicTokenResponse>> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .with_context(|| format!("check for token cache {}", self.path.display()))?;
        if !exists {
            return Ok(None);
        }

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read token cache {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&raw)
            .map(Some)
            .with_context(|| format!("parse token cache {}", self.path.display()))
    }

    pub async fn store(&self, token: &BasicTokenResponse) -> eyre::Result<()> {
        let json = serde_json::to_string(token).context("serialize OAuth token")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("write token cache {}", self.path.display()))
    }
}

/// Produces a usable token: the cached one if it still refreshes, a brand new one otherwise.
///
/// Whatever token comes out is written back to the cache.
pub async fn authorize(
    manager: &OAuthManager,
    cache: &TokenCache,
) -> eyre::Result<TimeBoundAccessToken> {
    let token = match cache.load().await? {
        Some(cached) => {
            let mut token = TimeBoundAccessToken::expired(cached);
            if token.refresh(manager).await? {
                token
            } else {
                tracing::warn!("cached token could not be refreshed, re-authenticating");
                TimeBoundAccessToken::new(manager.authenticate().await?)
            }
        }
        None => {
            tracing::info!(cache = %cache.path().display(), "no cached token, authenticating");
            TimeBoundAccessToken::new(manager.authenticate().await?)
        }
    };

    cache.store(token.raw_token()).await?;
    Ok(token)
}

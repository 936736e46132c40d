// OAuth2 client-credentials token lifecycle
//
// Tokens are refreshed lazily: the next call that finds the cached token
// inside the safety margin before its expiry fetches a fresh one. There is
// no background timer.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use url::Url;

use crate::client::endpoint_url;
use crate::error::Error;
use crate::models::TokenResponse;

/// How long before expiry a token is considered stale.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Upper bound on a token lifetime we are willing to cache.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const TOKEN_PATH: [&str; 2] = ["oauth2", "token"];

/// API key and secret issued by the Ally developer portal.
///
/// Immutable for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub key: String,
    pub secret: SecretString,
}

impl Credentials {
    pub fn new(key: impl Into<String>, secret: SecretString) -> Self {
        Self {
            key: key.into(),
            secret,
        }
    }
}

/// Build the `Authorization: Basic ...` header value for the token endpoint.
pub fn basic_authorization(key: &str, secret: &SecretString) -> String {
    let raw = format!("{key}:{}", secret.expose_secret());
    format!("Basic {}", STANDARD.encode(raw))
}

/// A bearer token together with the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct Token {
    access_token: SecretString,
    expires_at: Instant,
}

impl Token {
    pub fn new(access_token: SecretString, expires_at: Instant) -> Self {
        Self {
            access_token,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// `true` while `now` is strictly before `expires_at - margin`.
    pub fn is_fresh_at(&self, now: Instant, margin: Duration) -> bool {
        self.expires_at
            .checked_sub(margin)
            .is_some_and(|refresh_at| now < refresh_at)
    }
}

/// Owns the cached bearer token and its renewal.
///
/// Acquisition is serialized behind an async mutex, so concurrent callers
/// that all find a stale token trigger a single token request. A failed
/// renewal leaves the previously cached token in place.
#[derive(Debug)]
pub struct TokenManager {
    credentials: Credentials,
    margin: Duration,
    token: Mutex<Option<Token>>,
}

impl TokenManager {
    pub fn new(credentials: Credentials, margin: Duration) -> Self {
        Self {
            credentials,
            margin,
            token: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Return a bearer token that is valid for at least `margin` more,
    /// fetching a new one from `POST /oauth2/token` if needed.
    pub async fn valid_token(
        &self,
        http: &reqwest::Client,
        base_url: &Url,
        timeout_secs: u64,
    ) -> Result<SecretString, Error> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if token.is_fresh_at(Instant::now(), self.margin) {
                return Ok(token.access_token.clone());
            }
            debug!("access token inside refresh margin, renewing");
        }

        let token = self.fetch(http, base_url, timeout_secs).await?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    /// Whether a token is currently cached (fresh or not).
    pub async fn has_token(&self) -> bool {
        self.token.lock().await.is_some()
    }

    async fn fetch(
        &self,
        http: &reqwest::Client,
        base_url: &Url,
        timeout_secs: u64,
    ) -> Result<Token, Error> {
        let url = endpoint_url(base_url, &TOKEN_PATH)?;
        debug!("requesting access token at {}", url);

        let resp = http
            .post(url)
            .header(
                AUTHORIZATION,
                basic_authorization(&self.credentials.key, &self.credentials.secret),
            )
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout_secs))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, timeout_secs))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "token request failed");
            return Err(token_failure(status, body));
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Authentication {
                message: "token response did not contain an access token".into(),
            })?;

        let lifetime = Duration::try_from_secs_f64(parsed.expires_in)
            .unwrap_or(Duration::ZERO)
            .min(MAX_TOKEN_LIFETIME);
        let now = Instant::now();
        let expires_at = now.checked_add(lifetime).unwrap_or(now);

        debug!(expires_in_secs = lifetime.as_secs(), "access token received");
        Ok(Token::new(SecretString::from(access_token), expires_at))
    }
}

/// Classify a non-2xx token reply. Server errors and rate limiting are
/// transient; everything else rejects the credentials.
fn token_failure(status: StatusCode, body: String) -> Error {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Error::Http {
            status: status.as_u16(),
            body,
        }
    } else {
        Error::Authentication {
            message: format!("token request rejected (HTTP {status}): {body}"),
        }
    }
}

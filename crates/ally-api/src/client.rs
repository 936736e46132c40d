// Ally API HTTP client
//
// Wraps `reqwest::Client` with bearer-token injection, URL construction and
// status classification. Endpoint methods live in `devices.rs` as inherent
// methods so this module stays about transport mechanics.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{Credentials, DEFAULT_REFRESH_MARGIN, TokenManager};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Authenticated client for the Ally cloud API.
///
/// Every request first asks the [`TokenManager`] for a fresh bearer token.
/// There is no retry at this layer: a failed call is returned to the caller
/// as-is, already classified.
#[derive(Debug)]
pub struct AllyClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: TokenManager,
    timeout_secs: u64,
}

impl AllyClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(credentials: Credentials, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url: transport.base_url.clone(),
            tokens: TokenManager::new(credentials, DEFAULT_REFRESH_MARGIN),
            timeout_secs: transport.timeout_secs(),
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            tokens: TokenManager::new(credentials, DEFAULT_REFRESH_MARGIN),
            timeout_secs: crate::transport::DEFAULT_TIMEOUT.as_secs(),
        }
    }

    /// Override how long before expiry the token is renewed.
    pub fn with_refresh_margin(self, margin: Duration) -> Self {
        let credentials = self.tokens.credentials().clone();
        Self {
            tokens: TokenManager::new(credentials, margin),
            ..self
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Acquire a token now instead of on the first data call.
    ///
    /// Used at setup so bad credentials surface before any polling starts.
    pub async fn authenticate(&self) -> Result<(), Error> {
        self.tokens
            .valid_token(&self.http, &self.base_url, self.timeout_secs)
            .await
            .map(drop)
    }

    /// Issue an authenticated request and return the parsed JSON body.
    ///
    /// An empty 2xx body yields `Value::Null`.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<Value, Error> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let url = endpoint_url(&self.base_url, &segments)?;
        let body = self.send(method, url, payload).await?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        decode(body)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON reply.
    pub(crate) async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, Error> {
        let url = endpoint_url(&self.base_url, segments)?;
        let body = self.send(Method::GET, url, None::<&Value>).await?;
        decode(body)
    }

    /// Send a POST request with a JSON body and decode the JSON reply.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        payload: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = endpoint_url(&self.base_url, segments)?;
        let body = self.send(Method::POST, url, Some(payload)).await?;
        decode(body)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        payload: Option<&(impl Serialize + Sync)>,
    ) -> Result<String, Error> {
        let token = self
            .tokens
            .valid_token(&self.http, &self.base_url, self.timeout_secs)
            .await?;

        debug!("{} {}", method, url);

        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, "application/json");
        if let Some(payload) = payload {
            builder = builder.json(payload);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;
        let status = resp.status();

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(status = status.as_u16(), "bearer token rejected, discarding cached token");
            self.tokens.invalidate().await;
            return Err(Error::Authentication {
                message: format!("bearer token rejected (HTTP {status})"),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;

        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

/// Append path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint_url(base: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn decode<T: DeserializeOwned>(body: String) -> Result<T, Error> {
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(e) => Err(Error::Deserialization {
            message: e.to_string(),
            body,
        }),
    }
}

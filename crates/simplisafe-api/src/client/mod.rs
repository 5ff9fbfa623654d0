// SimpliSafe REST client
//
// Wraps `reqwest::Client` with bearer-token injection, the single
// refresh-and-retry on 401, and status classification. Endpoint groups
// (auth, subscriptions, systems, door locks) are inherent methods in
// sibling files so this module stays focused on transport mechanics.

mod auth;
mod doorlock;
mod subscriptions;
mod system;

use std::sync::RwLock;

use chrono::Utc;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};
use url::Url;

pub use reqwest::Method;

use crate::auth::{ClientIdentity, CredentialManager, TokenPair};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Production REST base.
pub const DEFAULT_API_URL: &str = "https://api.simplisafe.com/v1/";

/// Production realtime socket endpoint.
pub const DEFAULT_WEBSOCKET_URL: &str = "wss://api.simplisafe.com/socket.io";

/// Response body type the cloud uses for plan-gated endpoints.
const NO_REMOTE_MANAGEMENT: &str = "NoRemoteManagement";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Body preview length used in error messages.
const PREVIEW_LEN: usize = 200;

/// A response read off the wire, before classification.
pub(crate) struct RawResponse {
    pub(crate) status: StatusCode,
    pub(crate) body: Option<Value>,
    pub(crate) text: String,
}

impl RawResponse {
    fn body_str(&self, key: &str) -> Option<&str> {
        self.body.as_ref()?.get(key)?.as_str()
    }
}

/// HTTP client for the SimpliSafe cloud.
///
/// Owns the credential state. Every authenticated call goes through
/// [`execute`](Self::execute), which attaches the current bearer token,
/// refreshes an expired token up front, and on a 401 refreshes and
/// retries exactly once.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    websocket_url: Url,
    identity: ClientIdentity,
    credentials: CredentialManager,
    user_id: RwLock<Option<u64>>,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the REST root (e.g. `https://api.simplisafe.com/v1/`);
    /// a missing trailing slash is added so relative paths join below it.
    pub fn new(
        base_url: Url,
        websocket_url: Url,
        identity: ClientIdentity,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, websocket_url, identity))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        websocket_url: Url,
        identity: ClientIdentity,
    ) -> Self {
        Self {
            http,
            base_url: with_trailing_slash(base_url),
            websocket_url,
            identity,
            credentials: CredentialManager::new(),
            user_id: RwLock::new(None),
        }
    }

    /// Client against the production endpoints.
    pub fn production(identity: ClientIdentity, transport: &TransportConfig) -> Result<Self, Error> {
        Self::new(
            Url::parse(DEFAULT_API_URL)?,
            Url::parse(DEFAULT_WEBSOCKET_URL)?,
            identity,
            transport,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn websocket_url(&self) -> &Url {
        &self.websocket_url
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    /// The account user ID, known after a successful login.
    pub fn user_id(&self) -> Option<u64> {
        *self
            .user_id
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn set_user_id(&self, user_id: Option<u64>) {
        *self
            .user_id
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = user_id;
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Run an authenticated request and return the decoded JSON body.
    ///
    /// An empty success body decodes as `Value::Null`. A 401 triggers one
    /// refresh and one retry; a refresh performed up front because the
    /// token had already expired counts as that one refresh.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        let mut pair = self
            .credentials
            .current()
            .ok_or(Error::CredentialsExpired)?;
        let mut refreshed = false;

        if pair.is_expired(Utc::now()) {
            debug!(path, "access token expired, refreshing before request");
            pair = self.refresh_if_current(&pair).await?;
            refreshed = true;
        }

        let raw = self
            .send(method.clone(), path, query, body, Some(&pair))
            .await?;
        if raw.status != StatusCode::UNAUTHORIZED {
            return classify(path, raw);
        }
        if refreshed {
            warn!(path, "request rejected with a freshly refreshed token");
            return Err(Error::CredentialsExpired);
        }

        debug!(path, "401 received, refreshing access token and retrying once");
        let pair = self.refresh_if_current(&pair).await?;
        let raw = self.send(method, path, query, body, Some(&pair)).await?;
        if raw.status == StatusCode::UNAUTHORIZED {
            warn!(path, "request rejected again after token refresh");
            return Err(Error::CredentialsExpired);
        }
        classify(path, raw)
    }

    /// Authenticated GET decoded into `T`.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let value = self.execute(Method::GET, path, query, None).await?;
        decode(path, value)
    }

    /// Authenticated POST with a JSON body, decoded into `T`.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<T, Error> {
        let value = self.execute(Method::POST, path, query, body).await?;
        decode(path, value)
    }

    /// Send one request and read the body. No status handling.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
        bearer: Option<&TokenPair>,
    ) -> Result<RawResponse, Error> {
        let url = self.base_url.join(path)?;
        debug!("{method} {url}");

        let mut builder = self.http.request(method, url).query(query);
        if let Some(pair) = bearer {
            builder = builder.bearer_auth(pair.access_token().expose_secret());
        }
        if let Some(body) = body {
            builder = builder.header(CONTENT_TYPE, JSON_CONTENT_TYPE).json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        trace!(path, %status, len = text.len(), "response received");

        let body = if text.trim().is_empty() {
            None
        } else {
            serde_json::from_str(&text).ok()
        };
        Ok(RawResponse { status, body, text })
    }
}

/// Map a raw response onto the error taxonomy, returning the body on success.
pub(crate) fn classify(path: &str, raw: RawResponse) -> Result<Value, Error> {
    if raw.body_str("type") == Some(NO_REMOTE_MANAGEMENT) {
        return Err(Error::EndpointUnavailable {
            endpoint: path.to_owned(),
        });
    }

    if raw.status.is_success() {
        return match raw.body {
            Some(body) => Ok(body),
            None if raw.text.trim().is_empty() => Ok(Value::Null),
            None => Err(Error::Deserialization {
                message: format!("expected JSON (body preview: {:?})", preview(&raw.text)),
                body: raw.text,
            }),
        };
    }

    Err(Error::Request {
        endpoint: path.to_owned(),
        status: Some(raw.status.as_u16()),
        message: format!("HTTP {}: {}", raw.status, preview(&raw.text)),
    })
}

/// Decode a JSON value into `T`, keeping the body for diagnostics.
pub(crate) fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, Error> {
    serde_json::from_value(value.clone()).map_err(|e| {
        let body = value.to_string();
        Error::Deserialization {
            message: format!("{path}: {e} (body preview: {:?})", preview(&body)),
            body,
        }
    })
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(PREVIEW_LEN) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

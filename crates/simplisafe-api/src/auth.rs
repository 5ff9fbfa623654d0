// Credential lifecycle types
//
// The token pair lives behind an `ArcSwapOption` so readers always see a
// whole pair: a refresh replaces access + refresh + expiry in one store.
// The network flows that produce pairs live in `client::auth`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use tokio::sync::Mutex;

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

const CLIENT_ID_SUFFIX: &str = ".WebApp.simplisafe.com";

// ── ClientIdentity ──────────────────────────────────────────────────

/// The identity this library presents to the cloud.
///
/// The same `client_id` must be reused after an MFA confirmation, so
/// callers persist it alongside their refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    client_id: String,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    /// A fresh random identity (UUID v4).
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// `{client_id}.WebApp.simplisafe.com`, sent with the password grant.
    pub fn client_id_string(&self) -> String {
        format!("{}{CLIENT_ID_SUFFIX}", self.client_id)
    }

    /// Web-app style device descriptor sent with the password grant.
    pub fn device_id(&self) -> String {
        let seed = device_seed(&self.client_id);
        format!(
            "WebApp; useragent=\"Safari 13.1 (SS-ID: {seed}) / macOS 10.15.6\"; uuid=\"{}\"; id=\"{seed}\"",
            self.client_id
        )
    }
}

/// First ten base64 characters of the client ID, split `AAAAA-BBBBB`.
fn device_seed(client_id: &str) -> String {
    let encoded = STANDARD.encode(client_id.as_bytes());
    let seed = &encoded[..encoded.len().min(10)];
    let (head, tail) = seed.split_at(seed.len().min(5));
    format!("{head}-{tail}")
}

// ── LoginCredentials ────────────────────────────────────────────────

/// What the caller hands in to authenticate.
#[derive(Debug, Clone)]
pub enum LoginCredentials {
    /// Email + password (password grant, may trigger MFA).
    Password {
        email: String,
        password: SecretString,
    },
    /// A refresh token persisted from an earlier session.
    RefreshToken(SecretString),
}

// ── TokenPair ───────────────────────────────────────────────────────

/// Access + refresh token with the absolute access-token expiry.
#[derive(Debug, Clone)]
pub struct TokenPair {
    access_token: SecretString,
    refresh_token: SecretString,
    expires_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn new(
        access_token: SecretString,
        refresh_token: SecretString,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    /// Build a pair from a relative `expires_in` (seconds from `now`).
    pub fn expiring_in(
        access_token: SecretString,
        refresh_token: SecretString,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = now + TimeDelta::try_seconds(expires_in_secs).unwrap_or(TimeDelta::zero());
        Self::new(access_token, refresh_token, expires_at)
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// ── CredentialManager ───────────────────────────────────────────────

/// Owns the current token pair.
///
/// Refreshes are serialised through `refresh_lock`; a caller holding a
/// pair that another task already replaced can detect that with
/// [`is_superseded`](Self::is_superseded) and skip its own refresh.
#[derive(Debug, Default)]
pub struct CredentialManager {
    tokens: ArcSwapOption<TokenPair>,
    refresh_lock: Mutex<()>,
}

impl CredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The pair currently in use, if logged in.
    pub fn current(&self) -> Option<Arc<TokenPair>> {
        self.tokens.load_full()
    }

    /// Atomically replace the stored pair.
    pub fn store(&self, pair: TokenPair) -> Arc<TokenPair> {
        let pair = Arc::new(pair);
        self.tokens.store(Some(Arc::clone(&pair)));
        pair
    }

    /// Drop the stored pair (logout or unrecoverable auth failure).
    pub fn invalidate(&self) {
        self.tokens.store(None);
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.load().is_some()
    }

    /// `true` when no pair is stored or the stored access token expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.tokens
            .load_full()
            .is_none_or(|pair| pair.is_expired(now))
    }

    /// `true` if `seen` is no longer the stored pair.
    pub fn is_superseded(&self, seen: &Arc<TokenPair>) -> bool {
        self.tokens
            .load_full()
            .is_none_or(|current| !Arc::ptr_eq(&current, seen))
    }

    pub(crate) fn refresh_lock(&self) -> &Mutex<()> {
        &self.refresh_lock
    }
}

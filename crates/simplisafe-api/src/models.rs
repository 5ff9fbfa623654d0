// Wire types for the SimpliSafe REST API
//
// Only the fields the client logic branches on are typed. Everything the
// domain layer mirrors verbatim (locations, sensors, settings) stays as
// `serde_json::Value` so nothing the server sends is silently dropped.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::auth::{DEFAULT_TOKEN_LIFETIME_SECS, TokenPair};

// ── Authentication ──────────────────────────────────────────────────

/// Response from `POST api/token`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert into a stored pair. Servers that do not rotate the refresh
    /// token omit it; `previous_refresh` is kept in that case.
    pub fn into_pair(
        self,
        previous_refresh: Option<&SecretString>,
        now: DateTime<Utc>,
    ) -> Option<TokenPair> {
        let refresh = match self.refresh_token {
            Some(token) => SecretString::from(token),
            None => previous_refresh?.clone(),
        };
        Some(TokenPair::expiring_in(
            SecretString::from(self.access_token),
            refresh,
            self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
            now,
        ))
    }
}

/// Response from `GET api/authCheck`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCheckResponse {
    pub user_id: u64,
}

/// Response from `POST api/mfa/challenge`.
#[derive(Debug, Deserialize)]
pub struct MfaChallengeResponse {
    pub oob_code: String,
}

// ── Subscriptions ───────────────────────────────────────────────────

/// Response from `GET users/{user_id}/subscriptions`.
#[derive(Debug, Deserialize)]
pub struct SubscriptionsResponse {
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// One monitored location ("subscription") on the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription (system) identifier.
    pub sid: u64,

    /// Raw location block: address fields plus the `system` status object.
    #[serde(default)]
    pub location: serde_json::Value,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl Subscription {
    /// `location.system.version`, if the server reported one.
    pub fn system_version(&self) -> Option<u64> {
        self.location
            .pointer("/system/version")
            .and_then(serde_json::Value::as_u64)
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// Response from `GET subscriptions/{sid}/events`.
#[derive(Debug, Deserialize)]
pub struct EventsResponse {
    #[serde(default)]
    pub events: Vec<HistoryEvent>,
}

/// A historical event-log entry, in server order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    #[serde(default)]
    pub event_id: Option<u64>,
    #[serde(default)]
    pub event_timestamp: Option<i64>,
    #[serde(default)]
    pub event_cid: Option<u32>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub sensor_name: Option<String>,
    #[serde(default)]
    pub sensor_serial: Option<String>,
    #[serde(default)]
    pub sensor_type: Option<i64>,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl HistoryEvent {
    /// `eventTimestamp` as a UTC datetime.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.event_timestamp
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

// ── System state ────────────────────────────────────────────────────

/// Response from the V3 `POST ss3/subscriptions/{sid}/state/{state}`.
#[derive(Debug, Deserialize)]
pub struct V3StateResponse {
    pub state: String,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Response from the V2 `POST subscriptions/{sid}/state`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2StateResponse {
    pub success: bool,
    #[serde(default)]
    pub requested_state: Option<String>,
}

// ── Door locks ──────────────────────────────────────────────────────

/// Body value for `POST doorlock/{sid}/{serial}/state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockCommand {
    Lock,
    Unlock,
}

impl LockCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }
}

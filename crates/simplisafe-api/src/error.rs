use thiserror::Error;

/// Top-level error type for the `simplisafe-api` crate.
///
/// Covers every failure mode across the REST surface and the realtime
/// socket. Transport library errors (`reqwest`, `tungstenite`) are
/// translated into these variants at the boundary and never surface raw.
/// `simplisafe-core` maps these into its own domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong email/password, unknown client).
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// Multi-factor authorization was requested and is not confirmed yet.
    ///
    /// Not a hard failure: confirm the emailed link, then log in again
    /// reusing `client_id`.
    #[error("Authorization pending -- confirm the emailed link, then log in again with client ID {client_id}")]
    PendingAuthorization { client_id: String },

    /// Access token rejected and the refresh token could not recover it.
    #[error("Credentials expired -- a fresh login is required")]
    CredentialsExpired,

    // ── Requests ────────────────────────────────────────────────────
    /// Non-auth HTTP failure, or a transport failure before any response.
    #[error("Request to {endpoint} failed: {message}")]
    Request {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// The endpoint exists but is not part of the account's plan.
    #[error("Endpoint unavailable in plan: {endpoint}")]
    EndpointUnavailable { endpoint: String },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Realtime ────────────────────────────────────────────────────
    /// Realtime socket failure (handshake, framing, or closed stream).
    #[error("Websocket error: {0}")]
    Websocket(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map_or_else(|| "<unknown>".to_owned(), |u| u.path().to_owned());
        let message = if err.is_timeout() {
            format!("timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        Self::Request {
            endpoint,
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }
}

impl Error {
    /// Returns `true` if only a fresh login can resolve this error.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::CredentialsExpired
        )
    }

    /// HTTP status carried by a [`Request`](Self::Request) error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns `true` if the failure is worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { status: None, .. } | Self::Websocket(_) => true,
            Self::Request {
                status: Some(status),
                ..
            } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

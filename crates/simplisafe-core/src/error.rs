// ── Core error types ──
//
// Errors surfaced by the domain layer. Transport-level errors from
// simplisafe-api are translated through `From<simplisafe_api::Error>`;
// consumers never match on reqwest or tungstenite types.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// Multi-factor authorization is outstanding. Confirm the emailed
    /// link, then log in again reusing `client_id`.
    #[error("Authorization pending -- confirm the emailed link, then log in again with client ID {client_id}")]
    PendingAuthorization { client_id: String },

    #[error("Credentials expired -- a fresh login is required")]
    CredentialsExpired,

    // ── Requests ─────────────────────────────────────────────────────
    #[error("Request to {endpoint} failed: {message}")]
    Request {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// The feature is not part of the account's plan.
    #[error("Endpoint unavailable in plan: {endpoint}")]
    EndpointUnavailable { endpoint: String },

    #[error("Websocket error: {message}")]
    Websocket { message: String },

    // ── Domain ───────────────────────────────────────────────────────
    #[error("PIN error: {message}")]
    Pin { message: String },

    /// The entity is no longer present in its system's state map.
    #[error("Entity not found: {serial}")]
    EntityNotFound { serial: String },

    /// A field the accessor needs is absent from the raw payload.
    #[error("Missing field {field} on {owner}")]
    MissingField { owner: String, field: String },

    /// A field is present but has an unexpected shape.
    #[error("Invalid field {field} on {owner}: {reason}")]
    InvalidField {
        owner: String,
        field: String,
        reason: String,
    },

    #[error("Operation not supported: {operation} (on {target})")]
    Unsupported { operation: String, target: String },

    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Data / configuration ─────────────────────────────────────────
    #[error("Data error: {message}")]
    Data { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<simplisafe_api::Error> for CoreError {
    fn from(err: simplisafe_api::Error) -> Self {
        use simplisafe_api::Error as E;
        match err {
            E::InvalidCredentials { message } => Self::InvalidCredentials { message },
            E::PendingAuthorization { client_id } => Self::PendingAuthorization { client_id },
            E::CredentialsExpired => Self::CredentialsExpired,
            E::Request {
                endpoint,
                status,
                message,
            } => Self::Request {
                endpoint,
                status,
                message,
            },
            E::EndpointUnavailable { endpoint } => Self::EndpointUnavailable { endpoint },
            E::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            E::Deserialization { message, .. } => Self::Data { message },
            E::Websocket(message) => Self::Websocket { message },
        }
    }
}

impl CoreError {
    /// Returns `true` if only a fresh login can resolve this error.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials { .. } | Self::CredentialsExpired
        )
    }

    /// `true` when the failure means "feature absent" rather than broken.
    pub fn is_endpoint_unavailable(&self) -> bool {
        matches!(self, Self::EndpointUnavailable { .. })
    }

    pub(crate) fn missing(owner: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            owner: owner.into(),
            field: field.into(),
        }
    }

    pub(crate) fn invalid(
        owner: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidField {
            owner: owner.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn pin(message: impl Into<String>) -> Self {
        Self::Pin {
            message: message.into(),
        }
    }
}

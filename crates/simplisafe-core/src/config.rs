// ── Runtime client configuration ──
//
// Describes how to reach and authenticate against the cloud. Carries
// credential data and transport tuning but never touches disk; the
// simplisafe-config crate builds one of these from a profile.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use simplisafe_api::client::{DEFAULT_API_URL, DEFAULT_WEBSOCKET_URL};
use simplisafe_api::{ApiClient, ClientIdentity, LoginCredentials, TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// What to authenticate with.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Email + password. May end in a pending MFA authorization.
    Password {
        email: String,
        password: SecretString,
    },
    /// Refresh token saved from an earlier session.
    RefreshToken(SecretString),
}

impl AuthCredentials {
    pub(crate) fn to_login(&self) -> LoginCredentials {
        match self {
            Self::Password { email, password } => LoginCredentials::Password {
                email: email.clone(),
                password: password.clone(),
            },
            Self::RefreshToken(token) => LoginCredentials::RefreshToken(token.clone()),
        }
    }
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// Bundled web PKI roots.
    #[default]
    SystemDefaults,
    /// Additionally trust this PEM CA certificate (proxies, test rigs).
    CustomCa(PathBuf),
}

/// Configuration for one client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub auth: AuthCredentials,
    /// Client ID to present. Reuse the one from a pending MFA login;
    /// `None` generates a fresh one.
    pub client_id: Option<String>,
    /// REST base URL. `None` = production.
    pub api_url: Option<Url>,
    /// Realtime socket URL. `None` = production.
    pub websocket_url: Option<Url>,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(auth: AuthCredentials) -> Self {
        Self {
            auth,
            client_id: None,
            api_url: None,
            websocket_url: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_api_url(mut self, url: Url) -> Self {
        self.api_url = Some(url);
        self
    }

    pub fn with_websocket_url(mut self, url: Url) -> Self {
        self.websocket_url = Some(url);
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        };
        TransportConfig {
            tls,
            ..TransportConfig::default()
        }
        .with_timeout(self.timeout)
    }

    pub(crate) fn identity(&self) -> ClientIdentity {
        self.client_id
            .as_deref()
            .map_or_else(ClientIdentity::generate, ClientIdentity::new)
    }

    /// Build the wire client (not yet logged in).
    pub(crate) fn build_client(&self) -> Result<ApiClient, CoreError> {
        let api_url = match &self.api_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_API_URL).map_err(simplisafe_api::Error::from)?,
        };
        let websocket_url = match &self.websocket_url {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_WEBSOCKET_URL).map_err(simplisafe_api::Error::from)?,
        };
        Ok(ApiClient::new(
            api_url,
            websocket_url,
            self.identity(),
            &self.transport(),
        )?)
    }
}

//! Profile configuration for SimpliSafe clients.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `simplisafe_core::ClientConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use simplisafe_core::{AuthCredentials, ClientConfig, config::TlsVerification};

const KEYRING_SERVICE: &str = "simplisafe";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `None`.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    10
}

/// One SimpliSafe account.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Account email, needed for password login.
    pub email: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Refresh token (plaintext, prefer keyring).
    pub refresh_token: Option<String>,

    /// Environment variable holding a refresh token.
    pub refresh_token_env: Option<String>,

    /// Client ID to reuse across runs. Required to finish an MFA login.
    pub client_id: Option<String>,

    /// Override the REST endpoint.
    pub api_url: Option<String>,

    /// Override the realtime socket endpoint.
    pub websocket_url: Option<String>,

    /// Extra CA certificate to trust.
    pub ca_cert: Option<PathBuf>,

    /// Override the default timeout.
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "simplisafe", "simplisafe").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("simplisafe");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` layered over defaults, then `SIMPLISAFE_*` variables
/// (`SIMPLISAFE_DEFAULTS_TIMEOUT=30`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SIMPLISAFE_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Where secrets come from. Split out so resolution order is testable
/// without touching the process environment or the OS keyring.
struct Sources<E, K> {
    env: E,
    keyring: K,
}

fn keyring_user(profile_name: &str, kind: &str) -> String {
    format!("{profile_name}/{kind}")
}

fn keyring_lookup(user: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, user)
        .and_then(|entry| entry.get_password())
        .ok()
}

fn resolve_secret<E, K>(
    sources: &Sources<E, K>,
    env_name: Option<&str>,
    keyring_user: &str,
    plaintext: Option<&str>,
) -> Option<SecretString>
where
    E: Fn(&str) -> Option<String>,
    K: Fn(&str) -> Option<String>,
{
    // 1. Named env var
    if let Some(value) = env_name.and_then(|name| (sources.env)(name)) {
        return Some(SecretString::from(value));
    }

    // 2. System keyring
    if let Some(value) = (sources.keyring)(keyring_user) {
        return Some(SecretString::from(value));
    }

    // 3. Plaintext in config
    plaintext.map(|value| SecretString::from(value.to_owned()))
}

fn resolve_auth_from<E, K>(
    sources: &Sources<E, K>,
    profile: &Profile,
    profile_name: &str,
) -> Result<AuthCredentials, ConfigError>
where
    E: Fn(&str) -> Option<String>,
    K: Fn(&str) -> Option<String>,
{
    // A saved refresh token skips the password grant (and MFA).
    if let Some(token) = resolve_secret(
        sources,
        profile.refresh_token_env.as_deref(),
        &keyring_user(profile_name, "refresh-token"),
        profile.refresh_token.as_deref(),
    ) {
        return Ok(AuthCredentials::RefreshToken(token));
    }

    let email = profile
        .email
        .clone()
        .or_else(|| (sources.env)("SIMPLISAFE_EMAIL"))
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let password_env = profile.password_env.as_deref().unwrap_or("SIMPLISAFE_PASSWORD");
    let password = resolve_secret(
        sources,
        Some(password_env),
        &keyring_user(profile_name, "password"),
        profile.password.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })?;
    Ok(AuthCredentials::Password { email, password })
}

/// Resolve credentials for a profile.
///
/// A refresh token wins over a password. Each secret is looked up in its
/// env var, then the keyring, then the plaintext field.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    let sources = Sources {
        env: |name: &str| std::env::var(name).ok(),
        keyring: keyring_lookup,
    };
    resolve_auth_from(&sources, profile, profile_name)
}

/// Persist a (possibly rotated) refresh token in the keyring.
pub fn store_refresh_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    use secrecy::ExposeSecret;

    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name, "refresh-token"))?;
    entry.set_password(token.expose_secret())?;
    debug!(profile = profile_name, "refresh token stored in keyring");
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_url(field: &str, raw: Option<&str>) -> Result<Option<url::Url>, ConfigError> {
    raw.map(|raw| {
        raw.parse().map_err(|_| ConfigError::Validation {
            field: field.into(),
            reason: format!("invalid URL: {raw}"),
        })
    })
    .transpose()
}

fn build_client_config(
    auth: AuthCredentials,
    profile: &Profile,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::new(auth);
    config.client_id.clone_from(&profile.client_id);
    config.api_url = parse_url("api_url", profile.api_url.as_deref())?;
    config.websocket_url = parse_url("websocket_url", profile.websocket_url.as_deref())?;
    if let Some(ref ca_path) = profile.ca_cert {
        config.tls = TlsVerification::CustomCa(ca_path.clone());
    }
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    Ok(config)
}

/// Build a `ClientConfig` from a profile.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let auth = resolve_auth(profile, profile_name)?;
    build_client_config(auth, profile, defaults)
}

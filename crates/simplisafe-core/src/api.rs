// ── API facade ──
//
// Entry point for consumers: log in, list systems, open the realtime
// channel. Everything else hangs off the `System`s it returns.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use secrecy::SecretString;
use simplisafe_api::models::Subscription;
use simplisafe_api::{ApiClient, WebsocketClient};
use tracing::{error, info};

use crate::config::{AuthCredentials, ClientConfig};
use crate::error::CoreError;
use crate::system::{RefreshOptions, System};

/// A logged-in session.
pub struct Api {
    client: Arc<ApiClient>,
    websocket: WebsocketClient,
    subscriptions: ArcSwap<HashMap<u64, Subscription>>,
}

impl Api {
    /// Build a client from `config` and authenticate.
    ///
    /// An account with multi-factor authorization pending fails with
    /// [`CoreError::PendingAuthorization`]; confirm the emailed link, then
    /// call again with the returned client ID in
    /// [`ClientConfig::client_id`].
    pub async fn login(config: &ClientConfig) -> Result<Self, CoreError> {
        let client = Arc::new(config.build_client()?);
        client.login(&config.auth.to_login()).await?;
        info!(
            client_id = client.identity().client_id(),
            user_id = ?client.user_id(),
            "logged in"
        );
        Ok(Self::from_client(client))
    }

    /// Log in with email and password against production.
    pub async fn login_via_credentials(
        email: impl Into<String>,
        password: SecretString,
        client_id: Option<String>,
    ) -> Result<Self, CoreError> {
        let config = ClientConfig {
            client_id,
            ..ClientConfig::new(AuthCredentials::Password {
                email: email.into(),
                password,
            })
        };
        Self::login(&config).await
    }

    /// Resume a session from a saved refresh token against production.
    pub async fn login_via_refresh_token(
        refresh_token: SecretString,
        client_id: Option<String>,
    ) -> Result<Self, CoreError> {
        let config = ClientConfig {
            client_id,
            ..ClientConfig::new(AuthCredentials::RefreshToken(refresh_token))
        };
        Self::login(&config).await
    }

    /// Wrap an already authenticated client.
    pub fn from_client(client: Arc<ApiClient>) -> Self {
        let websocket = WebsocketClient::new(Arc::clone(&client));
        Self {
            client,
            websocket,
            subscriptions: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn user_id(&self) -> Option<u64> {
        self.client.user_id()
    }

    pub fn client_id(&self) -> &str {
        self.client.identity().client_id()
    }

    /// Current refresh token, for persisting between runs. Changes
    /// whenever the server rotates it.
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.client
            .credentials()
            .current()
            .map(|pair| pair.refresh_token().clone())
    }

    /// Subscriptions seen by the last [`Api::get_systems`], by system ID.
    pub fn subscription_data(&self) -> Arc<HashMap<u64, Subscription>> {
        self.subscriptions.load_full()
    }

    pub fn websocket(&self) -> &WebsocketClient {
        &self.websocket
    }

    // ── Systems ──────────────────────────────────────────────────────

    /// Discover every active system on the account and load its
    /// entities and settings.
    pub async fn get_systems(&self) -> Result<HashMap<u64, System>, CoreError> {
        let user_id = self.user_id().ok_or(CoreError::CredentialsExpired)?;
        let listed = self.client.get_subscriptions(user_id).await?;

        let mut subscriptions = HashMap::with_capacity(listed.len());
        let mut systems = HashMap::new();
        for subscription in listed {
            if subscription.system_version().is_none() {
                error!(
                    sid = subscription.sid,
                    "skipping subscription with missing system data"
                );
                continue;
            }
            subscriptions.insert(subscription.sid, subscription.clone());

            let system = System::new(Arc::clone(&self.client), &subscription)?;
            if !system.is_active() {
                info!(sid = subscription.sid, "skipping deactivated system");
                continue;
            }
            system
                .refresh(RefreshOptions {
                    include_system: false,
                    include_settings: true,
                    cached: true,
                })
                .await?;
            info!(
                sid = subscription.sid,
                version = %system.version(),
                entities = system.store().entities().len(),
                "system loaded"
            );
            systems.insert(subscription.sid, system);
        }

        self.subscriptions.store(Arc::new(subscriptions));
        Ok(systems)
    }

    /// Route pushed events into the matching systems' state.
    pub fn track_systems(&self, systems: &HashMap<u64, System>) {
        let systems = systems.clone();
        self.websocket.on_event(move |event| {
            if let Some(system) = event.sid.and_then(|sid| systems.get(&sid)) {
                system.apply_event(event);
            }
        });
    }

    /// Close the realtime channel and drop the tokens.
    pub async fn logout(&self) {
        self.websocket.disconnect().await;
        self.client.logout();
        info!("logged out");
    }
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("client_id", &self.client_id())
            .field("user_id", &self.user_id())
            .finish_non_exhaustive()
    }
}

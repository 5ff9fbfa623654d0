// Authentication flows
//
// Password grant (with the emailed-link MFA hand-off), refresh grant,
// and the `authCheck` lookup that yields the account user ID.

use std::sync::Arc;

use chrono::Utc;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{ApiClient, Method, RawResponse, classify, decode};
use crate::auth::{LoginCredentials, TokenPair};
use crate::error::Error;
use crate::models::{AuthCheckResponse, MfaChallengeResponse, TokenResponse};

const TOKEN_PATH: &str = "api/token";
const MFA_CHALLENGE_PATH: &str = "api/mfa/challenge";
const AUTH_CHECK_PATH: &str = "api/authCheck";

const APP_VERSION: &str = "1.62.0";
const SCOPE: &str = "offline_access";
const MFA_OOB_GRANT: &str = "http://simplisafe.com/oauth/grant-type/mfa-oob";

impl ApiClient {
    /// Authenticate and populate the user ID.
    ///
    /// A password login that triggers multi-factor authorization requests
    /// the email challenge and returns [`Error::PendingAuthorization`]; log
    /// in again with the same client ID once the link is confirmed.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(), Error> {
        match credentials {
            LoginCredentials::Password { email, password } => {
                self.password_login(email, password).await?;
            }
            LoginCredentials::RefreshToken(token) => {
                debug!("logging in with a stored refresh token");
                self.request_refresh(token).await?;
            }
        }
        self.fetch_user_id().await?;
        info!(user_id = ?self.user_id(), "logged in");
        Ok(())
    }

    /// Drop the stored tokens and user ID.
    pub fn logout(&self) {
        self.credentials().invalidate();
        self.set_user_id(None);
        debug!("logged out");
    }

    /// Force a refresh of the access token with the stored refresh token.
    pub async fn refresh_access_token(&self) -> Result<(), Error> {
        let pair = self
            .credentials()
            .current()
            .ok_or(Error::CredentialsExpired)?;
        self.refresh_if_current(&pair).await.map(|_| ())
    }

    /// Refresh unless another task already replaced `seen`.
    ///
    /// Returns the pair to use afterwards, whichever task produced it.
    pub(crate) async fn refresh_if_current(
        &self,
        seen: &Arc<TokenPair>,
    ) -> Result<Arc<TokenPair>, Error> {
        let _guard = self.credentials().refresh_lock().lock().await;
        if self.credentials().is_superseded(seen) {
            debug!("token pair already refreshed by another task");
            return self
                .credentials()
                .current()
                .ok_or(Error::CredentialsExpired);
        }
        self.request_refresh(seen.refresh_token()).await
    }

    async fn password_login(&self, email: &str, password: &SecretString) -> Result<(), Error> {
        let identity = self.identity();
        let payload = json!({
            "grant_type": "password",
            "username": email,
            "password": password.expose_secret(),
            "client_id": identity.client_id_string(),
            "device_id": identity.device_id(),
            "app_version": APP_VERSION,
            "scope": SCOPE,
        });

        let raw = self
            .send(Method::POST, TOKEN_PATH, &[], Some(&payload), None)
            .await?;

        let mfa_token = raw.body_str("mfa_token").map(str::to_owned);
        if mfa_token.is_some() || raw.body_str("error") == Some("mfa_required") {
            info!("multi-factor authorization required");
            match mfa_token {
                Some(mfa_token) => self.request_mfa_challenge(&mfa_token).await?,
                None => warn!("no mfa_token in the response, skipping the email challenge"),
            }
            return Err(Error::PendingAuthorization {
                client_id: identity.client_id().to_owned(),
            });
        }

        if is_rejection(raw.status) {
            return Err(Error::InvalidCredentials {
                message: rejection_message(&raw),
            });
        }

        let token: TokenResponse = decode(TOKEN_PATH, classify(TOKEN_PATH, raw)?)?;
        let pair = token
            .into_pair(None, Utc::now())
            .ok_or_else(|| missing_refresh_token(TOKEN_PATH))?;
        self.credentials().store(pair);
        Ok(())
    }

    /// Request the emailed MFA link, then register the out-of-band grant.
    async fn request_mfa_challenge(&self, mfa_token: &str) -> Result<(), Error> {
        let client_id = self.identity().client_id_string();
        let challenge = json!({
            "challenge_type": "oob",
            "client_id": client_id,
            "mfa_token": mfa_token,
        });
        let raw = self
            .send(Method::POST, MFA_CHALLENGE_PATH, &[], Some(&challenge), None)
            .await?;
        let challenge: MfaChallengeResponse =
            decode(MFA_CHALLENGE_PATH, classify(MFA_CHALLENGE_PATH, raw)?)?;

        let grant = json!({
            "client_id": client_id,
            "grant_type": MFA_OOB_GRANT,
            "mfa_token": mfa_token,
            "oob_code": challenge.oob_code,
            "scope": SCOPE,
        });
        // Answered with an authorization-pending body until the link is
        // confirmed, so the status is not inspected.
        self.send(Method::POST, TOKEN_PATH, &[], Some(&grant), None)
            .await?;
        Ok(())
    }

    /// Run the refresh grant and store the resulting pair.
    ///
    /// A 400/401/403 means the refresh token itself is dead: the stored
    /// tokens are dropped and `CredentialsExpired` is returned. Any other
    /// failure leaves the current tokens untouched.
    async fn request_refresh(&self, refresh_token: &SecretString) -> Result<Arc<TokenPair>, Error> {
        let payload = json!({
            "grant_type": "refresh_token",
            "client_id": self.identity().client_id(),
            "refresh_token": refresh_token.expose_secret(),
        });

        let raw = self
            .send(Method::POST, TOKEN_PATH, &[], Some(&payload), None)
            .await?;

        if is_rejection(raw.status) {
            warn!(status = %raw.status, "refresh token rejected");
            self.credentials().invalidate();
            return Err(Error::CredentialsExpired);
        }

        let value = classify(TOKEN_PATH, raw).inspect_err(|e| {
            warn!(error = %e, "token refresh failed, keeping current tokens");
        })?;
        let token: TokenResponse = decode(TOKEN_PATH, value)?;
        let pair = token
            .into_pair(Some(refresh_token), Utc::now())
            .ok_or_else(|| missing_refresh_token(TOKEN_PATH))?;
        debug!(expires_at = %pair.expires_at(), "access token refreshed");
        Ok(self.credentials().store(pair))
    }

    /// GET `api/authCheck`
    async fn fetch_user_id(&self) -> Result<u64, Error> {
        let check: AuthCheckResponse = self.get(AUTH_CHECK_PATH, &[]).await?;
        self.set_user_id(Some(check.user_id));
        Ok(check.user_id)
    }
}

fn is_rejection(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    )
}

fn rejection_message(raw: &RawResponse) -> String {
    raw.body_str("error_description")
        .or_else(|| raw.body_str("error"))
        .map_or_else(|| format!("HTTP {}", raw.status), str::to_owned)
}

fn missing_refresh_token(path: &str) -> Error {
    Error::Deserialization {
        message: format!("{path}: token response carried no refresh_token"),
        body: String::new(),
    }
}

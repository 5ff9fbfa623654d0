// Per-system endpoints
//
// Two hardware generations expose different paths: V3 ("SS3") systems live
// under `ss3/subscriptions/{sid}`, V2 systems under `subscriptions/{sid}`.
// Section payloads are returned as raw JSON; the domain layer mirrors them.

use serde_json::{Value, json};
use tracing::debug;

use super::ApiClient;
use crate::error::Error;
use crate::models::{V2StateResponse, V3StateResponse};

impl ApiClient {
    // ── V3 ───────────────────────────────────────────────────────────

    /// Fetch the raw sensor list of a V3 system.
    ///
    /// `GET ss3/subscriptions/{sid}/sensors?forceUpdate=..`
    ///
    /// `cached = false` forces a live poll of the base station.
    pub async fn get_v3_sensors(&self, system_id: u64, cached: bool) -> Result<Vec<Value>, Error> {
        let path = format!("ss3/subscriptions/{system_id}/sensors");
        debug!(system_id, cached, "fetching v3 sensors");
        let resp: Value = self
            .get(&path, &[("forceUpdate", (!cached).to_string())])
            .await?;
        Ok(array_at(resp, "/sensors"))
    }

    /// Fetch the full V3 settings payload (`settings.normal`, `settings.pins`,
    /// `basestationStatus`, ...).
    ///
    /// `GET ss3/subscriptions/{sid}/settings/normal?forceUpdate=..`
    pub async fn get_v3_settings(&self, system_id: u64, cached: bool) -> Result<Value, Error> {
        let path = format!("ss3/subscriptions/{system_id}/settings/normal");
        debug!(system_id, cached, "fetching v3 settings");
        self.get(&path, &[("forceUpdate", (!cached).to_string())])
            .await
    }

    /// Update V3 "normal" settings; returns the new settings payload.
    ///
    /// `POST ss3/subscriptions/{sid}/settings/normal` with `{"normal": {...}}`
    pub async fn set_v3_settings(&self, system_id: u64, normal: Value) -> Result<Value, Error> {
        let path = format!("ss3/subscriptions/{system_id}/settings/normal");
        debug!(system_id, "updating v3 settings");
        self.post(&path, &[], Some(&json!({ "normal": normal })))
            .await
    }

    /// Replace the V3 PIN set; returns the new settings payload.
    ///
    /// `POST ss3/subscriptions/{sid}/settings/pins`
    pub async fn set_v3_pins(&self, system_id: u64, payload: &Value) -> Result<Value, Error> {
        let path = format!("ss3/subscriptions/{system_id}/settings/pins");
        debug!(system_id, "updating v3 pins");
        self.post(&path, &[], Some(payload)).await
    }

    /// Arm or disarm a V3 system. `state` is `off`, `home` or `away`.
    ///
    /// `POST ss3/subscriptions/{sid}/state/{state}`
    pub async fn set_v3_state(&self, system_id: u64, state: &str) -> Result<V3StateResponse, Error> {
        let path = format!("ss3/subscriptions/{system_id}/state/{state}");
        debug!(system_id, state, "setting v3 state");
        self.post(&path, &[], None).await
    }

    // ── V2 ───────────────────────────────────────────────────────────

    /// Fetch the full V2 settings payload; sensors live at `settings.sensors`.
    ///
    /// `GET subscriptions/{sid}/settings?settingsType=all&cached=..`
    pub async fn get_v2_settings(&self, system_id: u64, cached: bool) -> Result<Value, Error> {
        let path = format!("subscriptions/{system_id}/settings");
        debug!(system_id, cached, "fetching v2 settings");
        self.get(
            &path,
            &[
                ("settingsType", "all".to_owned()),
                ("cached", cached.to_string()),
            ],
        )
        .await
    }

    /// Fetch the raw V2 PIN payload.
    ///
    /// `GET subscriptions/{sid}/pins?settingsType=all&cached=..`
    pub async fn get_v2_pins(&self, system_id: u64, cached: bool) -> Result<Value, Error> {
        let path = format!("subscriptions/{system_id}/pins");
        debug!(system_id, cached, "fetching v2 pins");
        self.get(
            &path,
            &[
                ("settingsType", "all".to_owned()),
                ("cached", cached.to_string()),
            ],
        )
        .await
    }

    /// Replace the V2 PIN set.
    ///
    /// `POST subscriptions/{sid}/pins`
    pub async fn set_v2_pins(&self, system_id: u64, payload: &Value) -> Result<Value, Error> {
        let path = format!("subscriptions/{system_id}/pins");
        debug!(system_id, "updating v2 pins");
        self.post(&path, &[], Some(payload)).await
    }

    /// Arm or disarm a V2 system. `state` is `off`, `home` or `away`.
    ///
    /// `POST subscriptions/{sid}/state?state={state}`
    pub async fn set_v2_state(&self, system_id: u64, state: &str) -> Result<V2StateResponse, Error> {
        let path = format!("subscriptions/{system_id}/state");
        debug!(system_id, state, "setting v2 state");
        self.post(&path, &[("state", state.to_owned())], None)
            .await
    }
}

/// Take the array at `pointer`, or an empty list when absent.
fn array_at(mut value: Value, pointer: &str) -> Vec<Value> {
    match value.pointer_mut(pointer).map(Value::take) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_at_missing_is_empty() {
        assert!(array_at(json!({}), "/sensors").is_empty());
        assert!(array_at(json!({ "sensors": null }), "/sensors").is_empty());
        assert_eq!(
            array_at(json!({ "sensors": [{ "serial": "a" }] }), "/sensors").len(),
            1
        );
    }
}

// Door lock command endpoint

use serde_json::{Value, json};
use tracing::debug;

use super::ApiClient;
use crate::error::Error;
use crate::models::LockCommand;

impl ApiClient {
    /// Lock or unlock a door lock.
    ///
    /// `POST doorlock/{sid}/{serial}/state` with `{"state": "lock"|"unlock"}`
    pub async fn set_lock_state(
        &self,
        system_id: u64,
        serial: &str,
        command: LockCommand,
    ) -> Result<Value, Error> {
        let path = format!("doorlock/{system_id}/{serial}/state");
        debug!(system_id, serial, command = command.as_str(), "sending lock command");
        self.post(&path, &[], Some(&json!({ "state": command }))).await
    }
}

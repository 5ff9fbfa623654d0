// ── Door locks (v3) ──
//
// The derived state has two sources: a jam flag and a raw lock code. The
// jam flag wins; otherwise the code decides. Both fields must be present;
// a present but unrecognised code reads as unknown.

use std::ops::Deref;

use serde_json::{Value, json};
use simplisafe_api::models::LockCommand;
use strum::FromRepr;
use tracing::{debug, error};

use crate::error::CoreError;
use crate::model::Entity;

/// Lock state as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LockState {
    Locked,
    Unlocked,
    Jammed,
    Unknown,
}

/// Raw `status.lockState` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
enum InternalLockState {
    Locked = 1,
    Unlocked = 2,
}

impl InternalLockState {
    fn from_raw(raw: &Value) -> Option<Self> {
        raw.as_u64()
            .and_then(|code| u8::try_from(code).ok())
            .and_then(Self::from_repr)
    }

    fn code(self) -> u8 {
        match self {
            Self::Locked => 1,
            Self::Unlocked => 2,
        }
    }
}

impl From<LockCommand> for InternalLockState {
    fn from(command: LockCommand) -> Self {
        match command {
            LockCommand::Lock => Self::Locked,
            LockCommand::Unlock => Self::Unlocked,
        }
    }
}

/// Derive the caller-visible state from a raw lock bag.
pub(crate) fn derive_state(owner: &str, raw: &Value) -> Result<LockState, CoreError> {
    let jammed = raw
        .pointer("/status/lockJamState")
        .ok_or_else(|| CoreError::missing(owner, "status.lockJamState"))?;
    if is_truthy(jammed) {
        return Ok(LockState::Jammed);
    }
    let code = raw
        .pointer("/status/lockState")
        .ok_or_else(|| CoreError::missing(owner, "status.lockState"))?;
    Ok(match InternalLockState::from_raw(code) {
        Some(InternalLockState::Locked) => LockState::Locked,
        Some(InternalLockState::Unlocked) => LockState::Unlocked,
        None => {
            error!(raw_state = %code, "Unknown raw lock state");
            LockState::Unknown
        }
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n.abs() > f64::EPSILON),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}

#[derive(Debug, Clone)]
pub struct Lock {
    entity: Entity,
}

impl Lock {
    pub(crate) fn new(entity: Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    pub fn state(&self) -> Result<LockState, CoreError> {
        self.entity
            .with_raw(|raw| derive_state(&self.entity.owner(), raw))
    }

    pub fn disabled(&self) -> Result<bool, CoreError> {
        self.entity.bool_field("/status/lockDisabled")
    }

    pub fn lock_low_battery(&self) -> Result<bool, CoreError> {
        self.entity.bool_field("/status/lockLowBattery")
    }

    pub fn pin_pad_low_battery(&self) -> Result<bool, CoreError> {
        self.entity.bool_field("/status/pinPadLowBattery")
    }

    pub fn pin_pad_offline(&self) -> Result<bool, CoreError> {
        self.entity.bool_field("/status/pinPadOffline")
    }

    pub async fn lock(&self) -> Result<(), CoreError> {
        self.send(LockCommand::Lock).await
    }

    pub async fn unlock(&self) -> Result<(), CoreError> {
        self.send(LockCommand::Unlock).await
    }

    /// Issue the command, then record the expected raw code locally. A
    /// failed command leaves the local state untouched.
    async fn send(&self, command: LockCommand) -> Result<(), CoreError> {
        self.entity.require_v3(command.as_str())?;
        self.entity.with_raw(|_| Ok(()))?;

        let system = self.entity.system();
        system
            .api()
            .set_lock_state(system.system_id(), self.entity.serial(), command)
            .await?;

        let code = InternalLockState::from(command).code();
        let applied = system
            .store()
            .edit_entity(self.entity.serial(), |raw| set_lock_code(raw, code));
        debug!(
            serial = self.entity.serial(),
            command = command.as_str(),
            applied,
            "lock command accepted"
        );
        Ok(())
    }
}

fn set_lock_code(raw: &mut Value, code: u8) {
    let Some(bag) = raw.as_object_mut() else {
        return;
    };
    let status = bag.entry("status").or_insert_with(|| json!({}));
    if let Some(status) = status.as_object_mut() {
        status.insert("lockState".into(), json!(code));
    }
}

impl Deref for Lock {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.entity
    }
}

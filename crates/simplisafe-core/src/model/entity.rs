// ── Entity view ──
//
// An `Entity` owns no device data. It holds its system and serial, and
// every read goes to the system's current entity snapshot, so a refresh is
// visible through views created before it.

use serde_json::Value;

use crate::error::CoreError;
use crate::model::EntityType;
use crate::system::{RefreshOptions, System, SystemVersion};

/// Live view of one device attached to a system.
#[derive(Debug, Clone)]
pub struct Entity {
    system: System,
    serial: String,
    entity_type: EntityType,
}

impl Entity {
    pub(crate) fn new(system: System, serial: String, entity_type: EntityType) -> Self {
        Self {
            system,
            serial,
            entity_type,
        }
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    /// Copy of the entity's current raw bag.
    pub fn raw(&self) -> Result<Value, CoreError> {
        self.with_raw(|raw| Ok(raw.clone()))
    }

    pub fn name(&self) -> Result<String, CoreError> {
        self.str_field("/name")
    }

    /// Refresh the owning system's entities (not location or settings).
    pub async fn update(&self, cached: bool) -> Result<(), CoreError> {
        self.system
            .refresh(RefreshOptions {
                include_system: false,
                include_settings: false,
                cached,
            })
            .await
    }

    // ── V3 status ────────────────────────────────────────────────────

    /// Whether the device reports a malfunction.
    pub fn error(&self) -> Result<bool, CoreError> {
        self.require_v3("error")?;
        self.bool_field_or("/status/malfunction", false)
    }

    pub fn low_battery(&self) -> Result<bool, CoreError> {
        self.require_v3("low_battery")?;
        self.bool_field("/flags/lowBattery")
    }

    pub fn offline(&self) -> Result<bool, CoreError> {
        self.require_v3("offline")?;
        self.bool_field("/flags/offline")
    }

    /// Raw per-device settings block.
    pub fn settings(&self) -> Result<Value, CoreError> {
        self.require_v3("settings")?;
        self.field("/setting")
    }

    // ── Field access ─────────────────────────────────────────────────

    /// Run `read` against the current raw bag.
    ///
    /// Fails with [`CoreError::EntityNotFound`] once the serial has left
    /// the system's entity map.
    pub(crate) fn with_raw<T>(
        &self,
        read: impl FnOnce(&Value) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let entities = self.system.store().entities();
        let raw = entities
            .get(&self.serial)
            .ok_or_else(|| CoreError::EntityNotFound {
                serial: self.serial.clone(),
            })?;
        read(raw)
    }

    pub(crate) fn field(&self, pointer: &str) -> Result<Value, CoreError> {
        self.with_raw(|raw| {
            raw.pointer(pointer)
                .cloned()
                .ok_or_else(|| CoreError::missing(self.owner(), field_name(pointer)))
        })
    }

    pub(crate) fn bool_field(&self, pointer: &str) -> Result<bool, CoreError> {
        self.with_raw(|raw| match raw.pointer(pointer) {
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(other) => Err(CoreError::invalid(
                self.owner(),
                field_name(pointer),
                format!("expected boolean, got {other}"),
            )),
            None => Err(CoreError::missing(self.owner(), field_name(pointer))),
        })
    }

    /// Like [`Self::bool_field`], but an absent or `null` field reads as
    /// `default`.
    pub(crate) fn bool_field_or(&self, pointer: &str, default: bool) -> Result<bool, CoreError> {
        self.with_raw(|raw| match raw.pointer(pointer) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(other) => Err(CoreError::invalid(
                self.owner(),
                field_name(pointer),
                format!("expected boolean, got {other}"),
            )),
        })
    }

    pub(crate) fn str_field(&self, pointer: &str) -> Result<String, CoreError> {
        self.with_raw(|raw| match raw.pointer(pointer) {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => Err(CoreError::invalid(
                self.owner(),
                field_name(pointer),
                format!("expected string, got {other}"),
            )),
            None => Err(CoreError::missing(self.owner(), field_name(pointer))),
        })
    }

    pub(crate) fn require_v3(&self, operation: &str) -> Result<(), CoreError> {
        match self.system.version() {
            SystemVersion::V3 => Ok(()),
            SystemVersion::V2 => Err(self.unsupported(operation)),
        }
    }

    pub(crate) fn unsupported(&self, operation: &str) -> CoreError {
        CoreError::Unsupported {
            operation: operation.to_owned(),
            target: format!(
                "{} {} on a {} system",
                self.entity_type,
                self.serial,
                self.system.version()
            ),
        }
    }

    pub(crate) fn owner(&self) -> String {
        format!("entity {}", self.serial)
    }
}

/// `/status/lockState` -> `status.lockState`
fn field_name(pointer: &str) -> String {
    pointer.trim_start_matches('/').replace('/', ".")
}

// ── Sensors ──
//
// Every v2 device and every v3 device that is neither a lock nor a
// camera. The two generations store the same facts under different keys.

use std::ops::Deref;

use serde_json::Value;

use crate::error::CoreError;
use crate::model::{Entity, EntityType};
use crate::system::SystemVersion;

#[derive(Debug, Clone)]
pub struct Sensor {
    entity: Entity,
}

impl Sensor {
    pub(crate) fn new(entity: Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    fn version(&self) -> SystemVersion {
        self.entity.system().version()
    }

    /// Raw v2 sensor readings.
    pub fn data(&self) -> Result<Value, CoreError> {
        match self.version() {
            SystemVersion::V2 => self.entity.field("/sensorData"),
            SystemVersion::V3 => Err(self.entity.unsupported("data")),
        }
    }

    pub fn error(&self) -> Result<bool, CoreError> {
        match self.version() {
            SystemVersion::V2 => self.entity.bool_field("/error"),
            SystemVersion::V3 => self.entity.error(),
        }
    }

    pub fn low_battery(&self) -> Result<bool, CoreError> {
        match self.version() {
            SystemVersion::V2 => Ok(self.entity.str_field("/battery")? != "ok"),
            SystemVersion::V3 => self.entity.low_battery(),
        }
    }

    /// Raw settings block (`setting` on both generations).
    pub fn settings(&self) -> Result<Value, CoreError> {
        self.entity.field("/setting")
    }

    /// Whether the sensor trips the alarm without an entry delay.
    pub fn trigger_instantly(&self) -> Result<bool, CoreError> {
        match self.version() {
            SystemVersion::V2 => self.entity.bool_field("/instant"),
            SystemVersion::V3 => self.entity.bool_field("/setting/instantTrigger"),
        }
    }

    pub fn triggered(&self) -> Result<bool, CoreError> {
        let kind = self.entity.entity_type();
        match self.version() {
            SystemVersion::V2 if kind == EntityType::Entry => {
                Ok(self.entity.str_field("/entryStatus")? == "open")
            }
            SystemVersion::V3 if kind.is_triggerable() => {
                self.entity.bool_field("/status/triggered")
            }
            _ => Err(self.entity.unsupported("triggered")),
        }
    }

    /// Reported temperature of a v3 temperature sensor.
    pub fn temperature(&self) -> Result<i64, CoreError> {
        if self.version() != SystemVersion::V3
            || self.entity.entity_type() != EntityType::Temperature
        {
            return Err(self.entity.unsupported("temperature"));
        }
        self.entity.with_raw(|raw| {
            raw.pointer("/status/temperature")
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    CoreError::missing(
                        format!("entity {}", self.entity.serial()),
                        "status.temperature",
                    )
                })
        })
    }
}

impl Deref for Sensor {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.entity
    }
}

// ── Cameras (v3) ──

use std::ops::Deref;

use serde_json::Value;

use crate::error::CoreError;
use crate::model::Entity;

#[derive(Debug, Clone)]
pub struct Camera {
    entity: Entity,
}

impl Camera {
    pub(crate) fn new(entity: Entity) -> Self {
        Self { entity }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Raw camera status block.
    pub fn status(&self) -> Result<Value, CoreError> {
        self.entity.field("/status")
    }

    pub fn camera_settings(&self) -> Result<Value, CoreError> {
        self.entity.field("/cameraSettings")
    }

    pub fn shutter_open_when_off(&self) -> Result<bool, CoreError> {
        self.shutter_open("/cameraSettings/shutterOff")
    }

    pub fn shutter_open_when_home(&self) -> Result<bool, CoreError> {
        self.shutter_open("/cameraSettings/shutterHome")
    }

    pub fn shutter_open_when_away(&self) -> Result<bool, CoreError> {
        self.shutter_open("/cameraSettings/shutterAway")
    }

    fn shutter_open(&self, pointer: &str) -> Result<bool, CoreError> {
        Ok(self.entity.str_field(pointer)? == "open")
    }
}

impl Deref for Camera {
    type Target = Entity;

    fn deref(&self) -> &Entity {
        &self.entity
    }
}

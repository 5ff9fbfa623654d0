// ── Domain model ──
//
// Views over a system's raw entity map plus the enums decoded from it.

mod camera;
mod entity;
mod entity_type;
mod lock;
mod sensor;
mod system_state;

pub use camera::Camera;
pub use entity::Entity;
pub use entity_type::EntityType;
pub use lock::{Lock, LockState};
pub use sensor::Sensor;
pub use system_state::{ArmingState, SystemState};

use crate::system::{System, SystemVersion};

/// An entity wrapped in the specialisation its type calls for.
#[derive(Debug, Clone)]
pub enum Device {
    Sensor(Sensor),
    Lock(Lock),
    Camera(Camera),
}

impl Device {
    /// Pick the specialisation: everything on v2 is a sensor; on v3 locks
    /// and cameras get their own views.
    pub(crate) fn build(system: System, serial: String, entity_type: EntityType) -> Self {
        let version = system.version();
        let entity = Entity::new(system, serial, entity_type);
        match (version, entity_type) {
            (SystemVersion::V3, EntityType::Lock) => Self::Lock(Lock::new(entity)),
            (SystemVersion::V3, EntityType::Camera) => Self::Camera(Camera::new(entity)),
            _ => Self::Sensor(Sensor::new(entity)),
        }
    }

    pub fn entity(&self) -> &Entity {
        match self {
            Self::Sensor(sensor) => sensor.entity(),
            Self::Lock(lock) => lock.entity(),
            Self::Camera(camera) => camera.entity(),
        }
    }

    pub fn serial(&self) -> &str {
        self.entity().serial()
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity().entity_type()
    }

    pub fn as_sensor(&self) -> Option<&Sensor> {
        match self {
            Self::Sensor(sensor) => Some(sensor),
            _ => None,
        }
    }

    pub fn as_lock(&self) -> Option<&Lock> {
        match self {
            Self::Lock(lock) => Some(lock),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&Camera> {
        match self {
            Self::Camera(camera) => Some(camera),
            _ => None,
        }
    }
}

// simplisafe-core: Domain layer over simplisafe-api
//
// `Api` is the entry point: it logs in, discovers `System`s and hands out
// the realtime channel. A `System` mirrors the server's raw state for one
// location; entities are live views into that mirror.

pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod system;

pub use api::Api;
pub use config::{AuthCredentials, ClientConfig};
pub use error::CoreError;
pub use model::{
    ArmingState, Camera, Device, Entity, EntityType, Lock, LockState, Sensor, SystemState,
};
pub use system::{RefreshOptions, System, SystemProperties, SystemVersion, Volume};

// Re-exported so consumers need only this crate.
pub use simplisafe_api::models::HistoryEvent;
pub use simplisafe_api::{ConnectionState, EventType, WebsocketClient, WebsocketEvent};

// ── System aggregate ──
//
// One monitored location. The system owns the raw server sections in a
// `SystemStore`; entity views read through it. Refreshes fetch every
// requested section before committing any of them.

mod pins;
mod settings;

pub use pins::PinMap;
pub use settings::{SystemProperties, Volume};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use simplisafe_api::ApiClient;
use simplisafe_api::models::{HistoryEvent, Subscription};
use simplisafe_api::websocket::{EventType, WebsocketEvent};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::{ArmingState, Camera, Device, EntityType, Lock, Sensor, SystemState};
use crate::store::{EntityMap, Snapshot, SystemStore};

/// Hardware generation. Decides endpoints and payload shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum SystemVersion {
    #[strum(serialize = "v2")]
    V2,
    #[strum(serialize = "v3")]
    V3,
}

impl SystemVersion {
    /// `2` is the legacy generation; anything else speaks the v3 API.
    pub fn from_raw(version: u64) -> Self {
        if version == 2 { Self::V2 } else { Self::V3 }
    }
}

/// Which sections a refresh fetches. Entities are always refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Re-read the location block (and with it the security state).
    pub include_system: bool,
    pub include_settings: bool,
    /// Allow the server to answer from its cache.
    pub cached: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            include_system: true,
            include_settings: true,
            cached: true,
        }
    }
}

struct SystemInner {
    api: Arc<ApiClient>,
    system_id: u64,
    version: SystemVersion,
    store: SystemStore,
}

/// Handle to one system. Cloning is cheap and shares state.
#[derive(Clone)]
pub struct System {
    inner: Arc<SystemInner>,
}

impl System {
    /// Build from a subscription listing entry. Entities stay empty until
    /// the first [`System::refresh`].
    pub fn new(api: Arc<ApiClient>, subscription: &Subscription) -> Result<Self, CoreError> {
        let version = subscription.system_version().ok_or_else(|| {
            CoreError::missing(
                format!("subscription {}", subscription.sid),
                "location.system.version",
            )
        })?;
        let location = subscription.location.clone();
        let state = state_from_location(&location);
        Ok(Self {
            inner: Arc::new(SystemInner {
                api,
                system_id: subscription.sid,
                version: SystemVersion::from_raw(version),
                store: SystemStore::new(location, state),
            }),
        })
    }

    pub fn system_id(&self) -> u64 {
        self.inner.system_id
    }

    pub fn version(&self) -> SystemVersion {
        self.inner.version
    }

    pub fn state(&self) -> SystemState {
        self.inner.store.state()
    }

    /// Follow security state changes, whether from commands, refreshes
    /// or pushed events.
    pub fn subscribe_state(&self) -> watch::Receiver<SystemState> {
        self.inner.store.subscribe()
    }

    pub fn store(&self) -> &SystemStore {
        &self.inner.store
    }

    pub(crate) fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    // ── Location ─────────────────────────────────────────────────────

    pub fn address(&self) -> Result<String, CoreError> {
        self.location_str("/street1")
    }

    pub fn alarm_going_off(&self) -> Result<bool, CoreError> {
        self.location_field("/system/isAlarming", Value::as_bool, "boolean")
    }

    pub fn connection_type(&self) -> Result<String, CoreError> {
        self.location_str("/system/connType")
    }

    /// Base station serial.
    pub fn serial(&self) -> Result<String, CoreError> {
        self.location_str("/system/serial")
    }

    /// Base station temperature, when the hardware reports one.
    pub fn temperature(&self) -> Option<i64> {
        self.inner
            .store
            .location()
            .pointer("/system/temperature")
            .and_then(Value::as_i64)
    }

    /// Deactivated systems are listed but not monitored. A missing flag
    /// counts as active.
    pub fn is_active(&self) -> bool {
        self.inner
            .store
            .location()
            .pointer("/system/isActive")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    fn location_str(&self, pointer: &str) -> Result<String, CoreError> {
        self.location_field(pointer, |v| v.as_str().map(str::to_owned), "string")
    }

    fn location_field<T>(
        &self,
        pointer: &str,
        read: impl FnOnce(&Value) -> Option<T>,
        expected: &str,
    ) -> Result<T, CoreError> {
        let location = self.inner.store.location();
        let owner = format!("system {}", self.inner.system_id);
        let field = format!("location{}", pointer.replace('/', "."));
        let value = location
            .pointer(pointer)
            .ok_or_else(|| CoreError::missing(&owner, &field))?;
        read(value).ok_or_else(|| CoreError::invalid(owner, field, format!("expected {expected}")))
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Re-fetch entities plus the optional sections, then commit them
    /// together. On error nothing is committed.
    pub async fn refresh(&self, options: RefreshOptions) -> Result<(), CoreError> {
        let location = async {
            if options.include_system {
                self.fetch_location().await.map(Some)
            } else {
                Ok(None)
            }
        };
        let settings = async {
            if options.include_settings {
                self.fetch_settings(options.cached).await
            } else {
                Ok(None)
            }
        };
        let (location, entities, settings) =
            tokio::try_join!(location, self.fetch_entities(options.cached), settings)?;

        let state = location.as_ref().map(state_from_location);
        debug!(
            system_id = self.inner.system_id,
            entities = entities.len(),
            location = location.is_some(),
            settings = settings.is_some(),
            "committing refresh"
        );
        self.inner.store.commit(Snapshot {
            location,
            entities: Some(entities),
            settings,
        });
        if let Some(state) = state {
            self.inner.store.set_state(state);
        }
        Ok(())
    }

    async fn fetch_location(&self) -> Result<Value, CoreError> {
        let user_id = self.inner.api.user_id().ok_or(CoreError::CredentialsExpired)?;
        let subscriptions = self.inner.api.get_subscriptions(user_id).await?;
        subscriptions
            .into_iter()
            .find(|s| s.sid == self.inner.system_id)
            .map(|s| s.location)
            .ok_or_else(|| CoreError::Data {
                message: format!(
                    "system {} is no longer listed for this account",
                    self.inner.system_id
                ),
            })
    }

    async fn fetch_entities(&self, cached: bool) -> Result<EntityMap, CoreError> {
        let sid = self.inner.system_id;
        let items = match self.inner.version {
            SystemVersion::V3 => self.inner.api.get_v3_sensors(sid, cached).await?,
            SystemVersion::V2 => {
                let mut settings = self.inner.api.get_v2_settings(sid, cached).await?;
                match settings.pointer_mut("/settings/sensors").map(Value::take) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                }
            }
        };
        Ok(index_entities(items))
    }

    /// `Ok(None)` leaves the settings section as it is. That covers v2,
    /// whose settings ride along with the entity fetch, and plans without
    /// settings access.
    async fn fetch_settings(&self, cached: bool) -> Result<Option<Value>, CoreError> {
        if self.inner.version == SystemVersion::V2 {
            return Ok(None);
        }
        match self
            .inner
            .api
            .get_v3_settings(self.inner.system_id, cached)
            .await
        {
            Ok(settings) => Ok(Some(settings)),
            Err(simplisafe_api::Error::EndpointUnavailable { endpoint }) => {
                info!(endpoint, "settings not available in this plan");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Entities ─────────────────────────────────────────────────────

    /// Every entity, in server order.
    pub fn entities(&self) -> Vec<Device> {
        self.inner
            .store
            .entities()
            .iter()
            .map(|(serial, raw)| {
                Device::build(self.clone(), serial.clone(), EntityType::from_raw(raw))
            })
            .collect()
    }

    pub fn sensors(&self) -> Vec<Sensor> {
        self.entities()
            .into_iter()
            .filter_map(|device| match device {
                Device::Sensor(sensor) => Some(sensor),
                _ => None,
            })
            .collect()
    }

    pub fn locks(&self) -> Vec<Lock> {
        self.entities()
            .into_iter()
            .filter_map(|device| match device {
                Device::Lock(lock) => Some(lock),
                _ => None,
            })
            .collect()
    }

    pub fn cameras(&self) -> Vec<Camera> {
        self.entities()
            .into_iter()
            .filter_map(|device| match device {
                Device::Camera(camera) => Some(camera),
                _ => None,
            })
            .collect()
    }

    pub fn device(&self, serial: &str) -> Result<Device, CoreError> {
        let entities = self.inner.store.entities();
        let raw = entities.get(serial).ok_or_else(|| CoreError::EntityNotFound {
            serial: serial.to_owned(),
        })?;
        Ok(Device::build(
            self.clone(),
            serial.to_owned(),
            EntityType::from_raw(raw),
        ))
    }

    // ── Security state ───────────────────────────────────────────────

    /// Command a new state. The local state follows what the server
    /// reports back.
    pub async fn set_state(&self, target: ArmingState) -> Result<(), CoreError> {
        let sid = self.inner.system_id;
        let state = match self.inner.version {
            SystemVersion::V3 => {
                let response = self.inner.api.set_v3_state(sid, target.as_str()).await?;
                SystemState::from_server(&response.state)
            }
            SystemVersion::V2 => {
                let response = self.inner.api.set_v2_state(sid, target.as_str()).await?;
                if !response.success {
                    return Err(CoreError::Request {
                        endpoint: format!("subscriptions/{sid}/state"),
                        status: None,
                        message: format!("server refused state {}", target.as_str()),
                    });
                }
                response
                    .requested_state
                    .as_deref()
                    .map_or_else(|| target.into(), SystemState::from_server)
            }
        };
        let previous = self.inner.store.set_state(state);
        info!(system_id = sid, from = %previous, to = %state, "system state changed");
        Ok(())
    }

    pub async fn set_off(&self) -> Result<(), CoreError> {
        self.set_state(ArmingState::Off).await
    }

    pub async fn set_home(&self) -> Result<(), CoreError> {
        self.set_state(ArmingState::Home).await
    }

    pub async fn set_away(&self) -> Result<(), CoreError> {
        self.set_state(ArmingState::Away).await
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Event history, newest first as the server orders it.
    pub async fn get_events(
        &self,
        from: Option<DateTime<Utc>>,
        num_events: Option<u32>,
    ) -> Result<Vec<HistoryEvent>, CoreError> {
        let events = self
            .inner
            .api
            .get_events(
                self.inner.system_id,
                from.map(|ts| ts.timestamp()),
                num_events,
            )
            .await?;
        Ok(events)
    }

    pub async fn get_latest_event(&self) -> Result<HistoryEvent, CoreError> {
        self.get_events(None, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::Data {
                message: format!("system {} has no events", self.inner.system_id),
            })
    }

    /// Fold a pushed event into the security state.
    ///
    /// Returns `true` if the event belonged to this system and moved its
    /// state. Later writes simply overwrite earlier ones, whichever source
    /// they come from.
    pub fn apply_event(&self, event: &WebsocketEvent) -> bool {
        if event.sid != Some(self.inner.system_id) {
            return false;
        }
        let Some(state) = state_for_event(event.event_type()) else {
            return false;
        };
        let previous = self.inner.store.set_state(state);
        debug!(
            system_id = self.inner.system_id,
            cid = ?event.event_cid,
            from = %previous,
            to = %state,
            "state updated from pushed event"
        );
        true
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("system_id", &self.inner.system_id)
            .field("version", &self.inner.version)
            .field("store", &self.inner.store)
            .finish_non_exhaustive()
    }
}

fn state_from_location(location: &Value) -> SystemState {
    location
        .pointer("/system/alarmState")
        .and_then(Value::as_str)
        .map_or(SystemState::Unknown, SystemState::from_server)
}

/// Security state implied by an event, if any.
fn state_for_event(event_type: EventType) -> Option<SystemState> {
    match event_type {
        EventType::AlarmTriggered => Some(SystemState::Alarm),
        EventType::AlarmCanceled
        | EventType::DisarmedByMasterPin
        | EventType::DisarmedByRemote => Some(SystemState::Off),
        EventType::ArmedHome => Some(SystemState::Home),
        EventType::ArmedAway | EventType::ArmedAwayByKeypad | EventType::ArmedAwayByRemote => {
            Some(SystemState::Away)
        }
        EventType::AwayExitDelayByKeypad | EventType::AwayExitDelayByRemote => {
            Some(SystemState::AwayCount)
        }
        EventType::HomeExitDelay => Some(SystemState::HomeCount),
        EventType::EntryDelay => Some(SystemState::EntryDelay),
        _ => None,
    }
}

/// Key raw entity bags by serial, keeping server order. Empty and
/// serial-less entries are dropped.
fn index_entities(items: Vec<Value>) -> EntityMap {
    let mut entities = EntityMap::with_capacity(items.len());
    for item in items {
        if item.as_object().is_none_or(serde_json::Map::is_empty) {
            continue;
        }
        let Some(serial) = item.get("serial").and_then(Value::as_str).map(str::to_owned) else {
            warn!(entity = %item, "skipping entity without serial");
            continue;
        };
        entities.insert(serial, item);
    }
    entities
}

// Pushed realtime events
//
// The server pushes one `event` message per occurrence on the user
// namespace. The CID code decides the event type; everything else is kept.
// A payload that does not have the usual shape still yields an event, with
// the raw payload carried in `extra`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// What a pushed event signals, derived from its CID code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    AlarmCanceled,
    AlarmTriggered,
    ArmedAway,
    ArmedAwayByKeypad,
    ArmedAwayByRemote,
    ArmedHome,
    AutomaticTest,
    AwayExitDelayByKeypad,
    AwayExitDelayByRemote,
    CameraMotionDetected,
    ConnectionLost,
    ConnectionRestored,
    DisarmedByMasterPin,
    DisarmedByRemote,
    DoorbellDetected,
    EntryDelay,
    EntryDetected,
    HomeExitDelay,
    MotionDetected,
    PowerOutage,
    PowerRestored,
    SecretAlertTriggered,
    SensorNotResponding,
    SensorRestored,
    TestingModeTriggered,
    UserInitiatedTest,
    Unknown,
}

impl EventType {
    /// Map a CID code; unrecognised codes become [`EventType::Unknown`].
    pub fn from_cid(cid: u32) -> Self {
        match cid {
            1110 | 1120 | 1132 | 1134 | 1154 | 1159 | 1162 => Self::AlarmTriggered,
            1170 => Self::CameraMotionDetected,
            1301 => Self::PowerOutage,
            1350 => Self::ConnectionLost,
            1381 => Self::SensorNotResponding,
            1400 => Self::DisarmedByMasterPin,
            1406 => Self::AlarmCanceled,
            1407 => Self::DisarmedByRemote,
            1409 => Self::MotionDetected,
            1429 => Self::EntryDetected,
            1458 => Self::DoorbellDetected,
            1531 => Self::TestingModeTriggered,
            1602 => Self::AutomaticTest,
            3301 => Self::PowerRestored,
            3350 => Self::ConnectionRestored,
            3381 => Self::SensorRestored,
            3401 => Self::ArmedAwayByKeypad,
            3407 => Self::ArmedAwayByRemote,
            3441 | 3491 => Self::ArmedHome,
            3481 | 3487 => Self::ArmedAway,
            9401 => Self::AwayExitDelayByKeypad,
            9407 => Self::AwayExitDelayByRemote,
            9441 => Self::HomeExitDelay,
            9700 | 9702 => Self::SecretAlertTriggered,
            9701 => Self::EntryDelay,
            9703 => Self::UserInitiatedTest,
            other => {
                debug!(cid = other, "unrecognised event CID");
                Self::Unknown
            }
        }
    }
}

/// A parsed event from the realtime socket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsocketEvent {
    /// CID code identifying the kind of event.
    #[serde(default)]
    pub event_cid: Option<u32>,

    /// Human-readable description, e.g. `"System Disarmed by Master PIN"`.
    #[serde(default)]
    pub info: String,

    /// System (subscription) the event belongs to.
    #[serde(default)]
    pub sid: Option<u64>,

    /// Unix timestamp (seconds) of the occurrence.
    #[serde(default)]
    pub event_timestamp: i64,

    #[serde(default)]
    pub pin_name: Option<String>,
    #[serde(default)]
    pub sensor_name: Option<String>,
    #[serde(default)]
    pub sensor_serial: Option<String>,
    /// Raw entity type code of the sensor involved, if any.
    #[serde(default)]
    pub sensor_type: Option<i64>,

    /// All remaining fields the server sends.
    #[serde(flatten)]
    pub extra: Value,
}

impl WebsocketEvent {
    /// Build an event from a pushed payload.
    ///
    /// Never fails: a payload that does not deserialize (`null`, a bare
    /// string, mistyped fields) becomes an event with no CID or system,
    /// holding the payload untouched in `extra`.
    pub fn from_payload(data: Value) -> Self {
        if data.is_object() {
            match serde_json::from_value(data.clone()) {
                Ok(event) => return event,
                Err(e) => debug!(error = %e, "realtime event has an unexpected shape"),
            }
        }
        Self {
            extra: data,
            ..Self::default()
        }
    }

    /// Event type from the CID code; [`EventType::Unknown`] without one.
    pub fn event_type(&self) -> EventType {
        self.event_cid.map_or(EventType::Unknown, EventType::from_cid)
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.event_timestamp, 0)
    }
}

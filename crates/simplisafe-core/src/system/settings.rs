// ── V3 base station settings ──

use std::ops::RangeInclusive;

use serde_json::{Map, Value, json};
use strum::{Display, FromRepr};
use tracing::info;

use super::{System, SystemVersion};
use crate::error::CoreError;
use crate::store::Snapshot;

/// Volume levels for alarm, chime and voice prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Volume {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Volume {
    fn level(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

const ALARM_DURATION: RangeInclusive<u32> = 30..=480;
const ENTRY_DELAY_AWAY: RangeInclusive<u32> = 30..=255;
const ENTRY_DELAY_HOME: RangeInclusive<u32> = 0..=255;
const EXIT_DELAY_AWAY: RangeInclusive<u32> = 45..=255;
const EXIT_DELAY_HOME: RangeInclusive<u32> = 0..=255;

/// Settings to change with [`System::set_properties`]. `None` fields are
/// left as they are. Durations and delays are in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemProperties {
    pub alarm_duration: Option<u32>,
    pub alarm_volume: Option<Volume>,
    pub chime_volume: Option<Volume>,
    pub entry_delay_away: Option<u32>,
    pub entry_delay_home: Option<u32>,
    pub exit_delay_away: Option<u32>,
    pub exit_delay_home: Option<u32>,
    pub light: Option<bool>,
    pub voice_prompt_volume: Option<Volume>,
}

impl SystemProperties {
    pub fn validate(&self) -> Result<(), CoreError> {
        check("alarm_duration", self.alarm_duration, &ALARM_DURATION)?;
        check("entry_delay_away", self.entry_delay_away, &ENTRY_DELAY_AWAY)?;
        check("entry_delay_home", self.entry_delay_home, &ENTRY_DELAY_HOME)?;
        check("exit_delay_away", self.exit_delay_away, &EXIT_DELAY_AWAY)?;
        check("exit_delay_home", self.exit_delay_home, &EXIT_DELAY_HOME)?;
        Ok(())
    }

    /// The `normal` settings block the server expects.
    pub(crate) fn to_normal(&self) -> Map<String, Value> {
        let mut normal = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(value) = value {
                normal.insert(key.to_owned(), value);
            }
        };
        put("alarmDuration", self.alarm_duration.map(Value::from));
        put("alarmVolume", self.alarm_volume.map(|v| json!(v.level())));
        put("doorChime", self.chime_volume.map(|v| json!(v.level())));
        put("entryDelayAway", self.entry_delay_away.map(Value::from));
        put("entryDelayHome", self.entry_delay_home.map(Value::from));
        put("exitDelayAway", self.exit_delay_away.map(Value::from));
        put("exitDelayHome", self.exit_delay_home.map(Value::from));
        put("light", self.light.map(Value::from));
        put("voicePrompts", self.voice_prompt_volume.map(|v| json!(v.level())));
        normal
    }
}

fn check(field: &str, value: Option<u32>, range: &RangeInclusive<u32>) -> Result<(), CoreError> {
    match value {
        Some(value) if !range.contains(&value) => Err(CoreError::Validation {
            field: field.to_owned(),
            reason: format!(
                "{value} is outside {}..={}",
                range.start(),
                range.end()
            ),
        }),
        _ => Ok(()),
    }
}

impl System {
    pub fn alarm_duration(&self) -> Result<i64, CoreError> {
        self.setting_i64("/settings/normal/alarmDuration")
    }

    pub fn alarm_volume(&self) -> Result<Volume, CoreError> {
        self.setting_volume("/settings/normal/alarmVolume")
    }

    pub fn chime_volume(&self) -> Result<Volume, CoreError> {
        self.setting_volume("/settings/normal/doorChime")
    }

    pub fn voice_prompt_volume(&self) -> Result<Volume, CoreError> {
        self.setting_volume("/settings/normal/voicePrompts")
    }

    pub fn entry_delay_away(&self) -> Result<i64, CoreError> {
        self.setting_i64("/settings/normal/entryDelayAway")
    }

    pub fn entry_delay_home(&self) -> Result<i64, CoreError> {
        self.setting_i64("/settings/normal/entryDelayHome")
    }

    pub fn exit_delay_away(&self) -> Result<i64, CoreError> {
        self.setting_i64("/settings/normal/exitDelayAway")
    }

    pub fn exit_delay_home(&self) -> Result<i64, CoreError> {
        self.setting_i64("/settings/normal/exitDelayHome")
    }

    /// Whether the base station light is on.
    pub fn light(&self) -> Result<bool, CoreError> {
        self.setting("/settings/normal/light", Value::as_bool, "boolean")
    }

    pub fn wifi_ssid(&self) -> Result<String, CoreError> {
        self.setting(
            "/settings/normal/wifiSSID",
            |v| v.as_str().map(str::to_owned),
            "string",
        )
    }

    pub fn battery_backup_power_level(&self) -> Result<i64, CoreError> {
        self.setting_i64("/basestationStatus/backupBattery")
    }

    pub fn wall_power_level(&self) -> Result<i64, CoreError> {
        self.setting_i64("/basestationStatus/wallPower")
    }

    pub fn gsm_strength(&self) -> Result<i64, CoreError> {
        self.setting_i64("/basestationStatus/gsmRssi")
    }

    pub fn wifi_strength(&self) -> Result<i64, CoreError> {
        self.setting_i64("/basestationStatus/wifiRssi")
    }

    pub fn rf_jamming(&self) -> Result<bool, CoreError> {
        self.setting("/basestationStatus/rfJamming", Value::as_bool, "boolean")
    }

    /// Validate and push settings changes; the stored settings become the
    /// server's answer.
    pub async fn set_properties(&self, properties: &SystemProperties) -> Result<(), CoreError> {
        self.require_v3_settings("set_properties")?;
        properties.validate()?;
        let normal = properties.to_normal();
        if normal.is_empty() {
            return Err(CoreError::Validation {
                field: "properties".into(),
                reason: "nothing to change".into(),
            });
        }

        let keys: Vec<String> = normal.keys().cloned().collect();
        let settings = self
            .api()
            .set_v3_settings(self.system_id(), Value::Object(normal))
            .await?;
        self.store().commit(Snapshot {
            settings: Some(settings),
            ..Snapshot::default()
        });
        info!(system_id = self.system_id(), ?keys, "system properties updated");
        Ok(())
    }

    fn require_v3_settings(&self, operation: &str) -> Result<(), CoreError> {
        match self.version() {
            SystemVersion::V3 => Ok(()),
            SystemVersion::V2 => Err(CoreError::Unsupported {
                operation: operation.to_owned(),
                target: format!("v2 system {}", self.system_id()),
            }),
        }
    }

    fn setting<T>(
        &self,
        pointer: &str,
        read: impl FnOnce(&Value) -> Option<T>,
        expected: &str,
    ) -> Result<T, CoreError> {
        let field = pointer.trim_start_matches('/').replace('/', ".");
        self.require_v3_settings(&field)?;
        let settings = self.store().settings();
        let owner = format!("system {} settings", self.system_id());
        let value = settings
            .pointer(pointer)
            .ok_or_else(|| CoreError::missing(&owner, &field))?;
        read(value).ok_or_else(|| CoreError::invalid(owner, field, format!("expected {expected}")))
    }

    fn setting_i64(&self, pointer: &str) -> Result<i64, CoreError> {
        self.setting(pointer, Value::as_i64, "integer")
    }

    fn setting_volume(&self, pointer: &str) -> Result<Volume, CoreError> {
        self.setting(
            pointer,
            |v| {
                v.as_u64()
                    .and_then(|level| u8::try_from(level).ok())
                    .and_then(Volume::from_repr)
            },
            "volume level 0-3",
        )
    }
}

// ── Entity type codes ──

use serde_json::Value;
use strum::{Display, FromRepr};
use tracing::error;

/// Kind of device attached to a system, decoded from the raw `type` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromRepr)]
#[strum(serialize_all = "snake_case")]
#[repr(u16)]
#[non_exhaustive]
pub enum EntityType {
    Remote = 0,
    Keypad = 1,
    Keychain = 2,
    PanicButton = 3,
    Motion = 4,
    Entry = 5,
    GlassBreak = 6,
    CarbonMonoxide = 7,
    Smoke = 8,
    Leak = 9,
    Temperature = 10,
    Camera = 12,
    Siren = 13,
    Doorbell = 15,
    Lock = 16,
    Unknown = 99,
    LockKeypad = 253,
}

impl EntityType {
    /// Decode a raw code. Codes this library does not know become
    /// [`EntityType::Unknown`] so new hardware never breaks discovery.
    pub fn from_code(code: i64) -> Self {
        let known = u16::try_from(code).ok().and_then(Self::from_repr);
        known.unwrap_or_else(|| {
            error!(code, "Unknown entity type");
            Self::Unknown
        })
    }

    /// Decode the `type` field of a raw entity bag. Absent or non-numeric
    /// values decode as unknown.
    pub fn from_raw(raw: &Value) -> Self {
        raw.get("type")
            .and_then(Value::as_i64)
            .map_or(Self::Unknown, Self::from_code)
    }

    /// Types whose v3 status carries a `triggered` flag.
    pub fn is_triggerable(self) -> bool {
        matches!(
            self,
            Self::CarbonMonoxide
                | Self::Entry
                | Self::GlassBreak
                | Self::Leak
                | Self::Motion
                | Self::Smoke
                | Self::Temperature
        )
    }
}

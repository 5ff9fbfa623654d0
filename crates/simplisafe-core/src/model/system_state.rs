// ── Security states ──

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::error;

/// Security state of a system as last reported or commanded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    Alarm,
    AlarmCount,
    Away,
    AwayCount,
    EntryDelay,
    Error,
    ExitDelay,
    Home,
    HomeCount,
    Off,
    Unknown,
}

impl SystemState {
    /// Decode a server state string (`"OFF"`, `"AWAY_COUNT"`, `"entryDelay"`).
    /// Unrecognised strings log and become [`SystemState::Unknown`].
    pub fn from_server(raw: &str) -> Self {
        Self::from_str(&to_snake_case(raw)).unwrap_or_else(|_| {
            error!(state = raw, "Unknown raw system state");
            Self::Unknown
        })
    }

    /// `true` while the alarm is sounding or about to.
    pub fn is_alarming(self) -> bool {
        matches!(self, Self::Alarm | Self::AlarmCount | Self::EntryDelay)
    }
}

/// A state the client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmingState {
    Off,
    Home,
    Away,
}

impl ArmingState {
    /// Path/query value the server expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Home => "home",
            Self::Away => "away",
        }
    }
}

impl From<ArmingState> for SystemState {
    fn from(state: ArmingState) -> Self {
        match state {
            ArmingState::Off => Self::Off,
            ArmingState::Home => Self::Home,
            ArmingState::Away => Self::Away,
        }
    }
}

/// `entryDelay` -> `entry_delay`; already-separated words pass through.
fn to_snake_case(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_lowercase());
    }
    out
}

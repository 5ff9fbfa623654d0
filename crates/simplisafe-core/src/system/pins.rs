// ── PIN management ──
//
// The server only accepts the whole PIN set at once, so every change
// re-reads the current set uncached, edits it, and sends it back.

use indexmap::IndexMap;
use serde_json::{Map, Value, json};
use tracing::info;

use super::{System, SystemVersion};
use crate::error::CoreError;
use crate::store::Snapshot;

/// PINs by label: `master`, `duress`, then user PINs in slot order.
pub type PinMap = IndexMap<String, String>;

const MASTER: &str = "master";
const DURESS: &str = "duress";
const PIN_LENGTH: usize = 4;
const MAX_USER_PINS: usize = 4;

fn is_reserved(label: &str) -> bool {
    label == MASTER || label == DURESS
}

impl System {
    pub async fn get_pins(&self, cached: bool) -> Result<PinMap, CoreError> {
        let sid = self.system_id();
        match self.version() {
            SystemVersion::V3 => {
                let settings = self.api().get_v3_settings(sid, cached).await?;
                let pins = parse_v3_pins(&settings)?;
                self.store().commit(Snapshot {
                    settings: Some(settings),
                    ..Snapshot::default()
                });
                Ok(pins)
            }
            SystemVersion::V2 => {
                let raw = self.api().get_v2_pins(sid, cached).await?;
                parse_v2_pins(&raw)
            }
        }
    }

    /// Create or replace the PIN stored under `label`.
    pub async fn set_pin(&self, label: &str, pin: &str) -> Result<(), CoreError> {
        if pin.chars().count() != PIN_LENGTH {
            return Err(CoreError::pin(format!("PINs must be {PIN_LENGTH} digits long")));
        }
        if !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoreError::pin("PINs can only contain numbers"));
        }

        let mut pins = self.get_pins(false).await?;
        if pins.values().any(|existing| existing == pin) {
            return Err(CoreError::pin(format!("Refusing to create duplicate PIN: {pin}")));
        }
        let max_pins = MAX_USER_PINS + 2;
        if pins.len() >= max_pins && !is_reserved(label) && !pins.contains_key(label) {
            return Err(CoreError::pin(format!(
                "Refusing to create more than {max_pins} PINs"
            )));
        }

        pins.insert(label.to_owned(), pin.to_owned());
        self.send_pins(&pins).await?;
        info!(system_id = self.system_id(), label, "PIN set");
        Ok(())
    }

    /// Remove a user PIN by its label or its value.
    pub async fn remove_pin(&self, pin_or_label: &str) -> Result<(), CoreError> {
        if is_reserved(pin_or_label) {
            return Err(CoreError::pin(format!(
                "Refusing to delete reserved PIN: {pin_or_label}"
            )));
        }

        let mut pins = self.get_pins(false).await?;
        let Some(label) = pins
            .iter()
            .find(|(label, pin)| *label == pin_or_label || *pin == pin_or_label)
            .map(|(label, _)| label.clone())
        else {
            return Err(CoreError::pin(format!(
                "Cannot delete nonexistent PIN: {pin_or_label}"
            )));
        };
        if is_reserved(&label) {
            return Err(CoreError::pin(format!("Refusing to delete reserved PIN: {label}")));
        }

        pins.shift_remove(&label);
        self.send_pins(&pins).await?;
        info!(system_id = self.system_id(), label, "PIN removed");
        Ok(())
    }

    async fn send_pins(&self, pins: &PinMap) -> Result<(), CoreError> {
        let sid = self.system_id();
        match self.version() {
            SystemVersion::V3 => {
                let settings = self.api().set_v3_pins(sid, &v3_payload(pins)?).await?;
                self.store().commit(Snapshot {
                    settings: Some(settings),
                    ..Snapshot::default()
                });
            }
            SystemVersion::V2 => {
                self.api().set_v2_pins(sid, &v2_payload(pins)?).await?;
            }
        }
        Ok(())
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

fn pin_at(raw: &Value, pointer: &str) -> Result<String, CoreError> {
    raw.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| {
            CoreError::missing("PIN payload", pointer.trim_start_matches('/').replace('/', "."))
        })
}

fn parse_v3_pins(settings: &Value) -> Result<PinMap, CoreError> {
    let mut pins = PinMap::new();
    pins.insert(MASTER.into(), pin_at(settings, "/settings/pins/master/pin")?);
    pins.insert(DURESS.into(), pin_at(settings, "/settings/pins/duress/pin")?);
    let users = settings
        .pointer("/settings/pins/users")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for user in users {
        let pin = user.get("pin").and_then(Value::as_str).unwrap_or_default();
        if pin.is_empty() {
            continue;
        }
        let name = user.get("name").and_then(Value::as_str).unwrap_or_default();
        pins.insert(name.to_owned(), pin.to_owned());
    }
    Ok(pins)
}

fn parse_v2_pins(raw: &Value) -> Result<PinMap, CoreError> {
    let mut pins = PinMap::new();
    pins.insert(MASTER.into(), pin_at(raw, "/pins/pin1/value")?);
    pins.insert(DURESS.into(), pin_at(raw, "/pins/duress/value")?);
    let Some(slots) = raw.pointer("/pins").and_then(Value::as_object) else {
        return Ok(pins);
    };
    for (key, slot) in slots {
        if key == "pin1" || key == DURESS {
            continue;
        }
        let value = slot.get("value").and_then(Value::as_str).unwrap_or_default();
        if value.is_empty() {
            continue;
        }
        let name = slot.get("name").and_then(Value::as_str).unwrap_or_default();
        pins.insert(name.to_owned(), value.to_owned());
    }
    Ok(pins)
}

// ── Payloads ────────────────────────────────────────────────────────

struct Split<'a> {
    master: &'a str,
    duress: &'a str,
    users: Vec<(&'a str, &'a str)>,
}

fn split(pins: &PinMap) -> Result<Split<'_>, CoreError> {
    let master = pins
        .get(MASTER)
        .ok_or_else(|| CoreError::pin("The master PIN is missing"))?;
    let duress = pins
        .get(DURESS)
        .ok_or_else(|| CoreError::pin("The duress PIN is missing"))?;
    let users: Vec<_> = pins
        .iter()
        .filter(|(label, _)| !is_reserved(label))
        .map(|(label, pin)| (label.as_str(), pin.as_str()))
        .collect();
    if users.len() > MAX_USER_PINS {
        return Err(CoreError::pin(format!(
            "At most {MAX_USER_PINS} user PINs are supported"
        )));
    }
    Ok(Split {
        master,
        duress,
        users,
    })
}

/// `{"pins": {"duress": {"pin"}, "master": {"pin"}, "users": {"0".."3": {"name", "pin"}}}}`
pub(crate) fn v3_payload(pins: &PinMap) -> Result<Value, CoreError> {
    let split = split(pins)?;
    let mut users = Map::new();
    for slot in 0..MAX_USER_PINS {
        let (name, pin) = split.users.get(slot).copied().unwrap_or(("", ""));
        users.insert(slot.to_string(), json!({ "name": name, "pin": pin }));
    }
    Ok(json!({
        "pins": {
            "duress": { "pin": split.duress },
            "master": { "pin": split.master },
            "users": users,
        }
    }))
}

/// `{"pins": {"duress": {"value"}, "pin1": {"value"}, "pin2".."pin5": {"name", "value"}}}`
pub(crate) fn v2_payload(pins: &PinMap) -> Result<Value, CoreError> {
    let split = split(pins)?;
    let mut slots = Map::new();
    slots.insert(DURESS.into(), json!({ "value": split.duress }));
    slots.insert("pin1".into(), json!({ "value": split.master }));
    for slot in 0..MAX_USER_PINS {
        let (name, value) = split.users.get(slot).copied().unwrap_or(("", ""));
        slots.insert(
            format!("pin{}", slot + 2),
            json!({ "name": name, "value": value }),
        );
    }
    Ok(json!({ "pins": slots }))
}

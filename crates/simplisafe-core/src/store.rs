// ── Per-system state mirror ──
//
// Holds the raw server sections for one system. Each section is an
// `ArcSwap` snapshot: readers always see a whole section, and a refresh
// swaps fully prepared sections in at once. The security state lives in a
// `watch` channel so consumers can follow transitions.

use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::watch;

use crate::model::SystemState;

/// Raw entity bags keyed by serial, in server order.
pub type EntityMap = IndexMap<String, Value>;

/// Sections produced by one refresh. `None` leaves a section untouched.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    pub(crate) location: Option<Value>,
    pub(crate) entities: Option<EntityMap>,
    pub(crate) settings: Option<Value>,
}

pub struct SystemStore {
    location: ArcSwap<Value>,
    entities: ArcSwap<EntityMap>,
    settings: ArcSwap<Value>,
    state: watch::Sender<SystemState>,
}

impl SystemStore {
    pub(crate) fn new(location: Value, state: SystemState) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            location: ArcSwap::from_pointee(location),
            entities: ArcSwap::from_pointee(EntityMap::new()),
            settings: ArcSwap::from_pointee(Value::Null),
            state,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Location block from the subscription listing.
    pub fn location(&self) -> Arc<Value> {
        self.location.load_full()
    }

    pub fn entities(&self) -> Arc<EntityMap> {
        self.entities.load_full()
    }

    /// Settings payload (`Null` until first fetched).
    pub fn settings(&self) -> Arc<Value> {
        self.settings.load_full()
    }

    pub fn state(&self) -> SystemState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SystemState> {
        self.state.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Swap in every section present in `snapshot`.
    pub(crate) fn commit(&self, snapshot: Snapshot) {
        if let Some(location) = snapshot.location {
            self.location.store(Arc::new(location));
        }
        if let Some(entities) = snapshot.entities {
            self.entities.store(Arc::new(entities));
        }
        if let Some(settings) = snapshot.settings {
            self.settings.store(Arc::new(settings));
        }
    }

    /// Overwrite the security state, returning the previous one.
    pub(crate) fn set_state(&self, state: SystemState) -> SystemState {
        self.state.send_replace(state)
    }

    /// Apply `edit` to one entity's bag, copy-on-write.
    ///
    /// Returns `false` (and changes nothing) if the serial is unknown.
    pub(crate) fn edit_entity(&self, serial: &str, edit: impl Fn(&mut Value)) -> bool {
        let mut found = false;
        self.entities.rcu(|current| {
            let mut next = EntityMap::clone(current);
            found = match next.get_mut(serial) {
                Some(raw) => {
                    edit(raw);
                    true
                }
                None => false,
            };
            next
        });
        found
    }
}

impl std::fmt::Debug for SystemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemStore")
            .field("entities", &self.entities.load().len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

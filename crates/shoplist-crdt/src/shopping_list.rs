use crate::{ActorId, Crdt, CrdtError, CrdtResult, OrSet, PnCounter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-item CRDT triple: two PN-counters plus an OR-Set tracking whether
/// the item is currently visible at all (spec §3.1/§4.1).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemCrdt {
    pub needed: PnCounter,
    pub acquired: PnCounter,
    pub existence: OrSet<String>,
}

impl Crdt for ItemCrdt {
    fn merge(&mut self, other: &Self) {
        self.needed.merge(&other.needed);
        self.acquired.merge(&other.acquired);
        self.existence.merge(&other.existence);
    }
}

/// Materialized (clamped, ≥0) view of one visible item, the pure function
/// of `get_visible_items()` named in spec §3.1 Invariant 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    pub needed: u64,
    pub acquired: u64,
}

/// A shopping list: a random-uuid-identified, mapping `name -> ItemCrdt`.
///
/// `merge` is commutative, associative and idempotent because it is built
/// entirely from merges of its three sub-CRDTs (spec §3.1 Invariant 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub uuid: String,
    pub name: Option<String>,
    pub clock: u64,
    pub items: BTreeMap<String, ItemCrdt>,
}

impl ShoppingList {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: None,
            clock: 0,
            items: BTreeMap::new(),
        }
    }

    pub fn with_name(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: Some(name.into()),
            clock: 0,
            items: BTreeMap::new(),
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn tag(&self, actor: &ActorId, clock: u64) -> String {
        format!("{actor}:{clock}")
    }

    /// Add an item, or — if it already exists locally — add a fresh
    /// existence tuple for it. Counters resume from the observed quantity
    /// (spec §3.1 Invariant 2): if the already-observed `needed`/`acquired`
    /// is below the requested amount, enough delta is applied to reach it;
    /// a re-add requesting less than what's already observed leaves the
    /// counters untouched.
    pub fn add_item(&mut self, actor: &ActorId, name: &str, needed: i64, acquired: i64) {
        let clock = self.tick();
        let tag = self.tag(actor, clock);

        let entry = self.items.entry(name.to_string()).or_default();
        let observed_needed = entry.needed.value() as i64;
        if observed_needed < needed {
            entry.needed.update(actor, needed - observed_needed);
        }
        let observed_acquired = entry.acquired.value() as i64;
        if observed_acquired < acquired {
            entry.acquired.update(actor, acquired - observed_acquired);
        }
        entry.existence.add(name.to_string(), tag);
    }

    /// Tombstone every currently-live existence tuple for `name`. Counter
    /// state is untouched, so a later re-add resumes from the same totals.
    pub fn remove_item(&mut self, name: &str) {
        self.tick();
        if let Some(item) = self.items.get_mut(name) {
            item.existence.remove(&name.to_string());
        }
    }

    pub fn update_needed(&mut self, actor: &ActorId, name: &str, delta: i64) {
        self.tick();
        if let Some(item) = self.items.get_mut(name) {
            item.needed.update(actor, delta);
        }
    }

    pub fn update_acquired(&mut self, actor: &ActorId, name: &str, delta: i64) {
        self.tick();
        if let Some(item) = self.items.get_mut(name) {
            item.acquired.update(actor, delta);
        }
    }

    /// The materialized view: only items with a live existence tuple,
    /// quantities clamped to `>= 0` (spec §3.1 Invariant 4, §8 property 5).
    pub fn get_visible_items(&self) -> BTreeMap<String, ItemView> {
        self.items
            .iter()
            .filter(|(name, item)| item.existence.contains(name))
            .map(|(name, item)| {
                (
                    name.clone(),
                    ItemView {
                        needed: item.needed.value(),
                        acquired: item.acquired.value(),
                    },
                )
            })
            .collect()
    }

    pub fn to_json(&self) -> CrdtResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CrdtResult<Self> {
        serde_json::from_str(json).map_err(|e| CrdtError::InvalidState {
            reason: format!("malformed ShoppingList json: {e}"),
        })
    }
}

impl Crdt for ShoppingList {
    fn merge(&mut self, other: &Self) {
        debug_assert_eq!(
            self.uuid, other.uuid,
            "merging ShoppingLists with different uuids"
        );
        self.clock = self.clock.max(other.clock);
        if other.name.is_some() {
            // Debug-only field; last writer observed during merge wins,
            // per spec §9's resolution of the source's inconsistent LWW
            // helpers for `name`.
            self.name = other.name.clone();
        }

        for (name, other_item) in &other.items {
            self.items
                .entry(name.clone())
                .or_default()
                .merge(other_item);
        }
    }
}

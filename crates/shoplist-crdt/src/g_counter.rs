use crate::{ActorId, Crdt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grow-only counter: actor-keyed, max-merged.
///
/// Never decreases under merge because each actor's own slot only ever
/// grows (callers must not pass negative amounts — see `PnCounter`, which
/// routes a negative delta into a second `GCounter`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GCounter {
    counts: BTreeMap<ActorId, u64>,
}

impl GCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, actor: &ActorId, amount: u64) {
        let entry = self.counts.entry(actor.clone()).or_insert(0);
        *entry += amount;
    }

    pub fn value(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn actor_value(&self, actor: &ActorId) -> u64 {
        self.counts.get(actor).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorId> {
        self.counts.keys()
    }
}

impl Crdt for GCounter {
    fn merge(&mut self, other: &Self) {
        for (actor, &count) in &other.counts {
            let entry = self.counts.entry(actor.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
    }
}

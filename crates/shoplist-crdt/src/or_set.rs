use crate::Crdt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Observed-Remove Set over literal `(element, tag)` pairs.
///
/// `add` always creates a fresh tag, so re-adding an element after a
/// remove produces a new, live element tuple distinct from the tombstoned
/// one (add-wins-on-concurrent-add-vs-remove). `remove` tombstones every
/// tuple for that element that is live *at the time of the call* — any
/// tuple added concurrently elsewhere survives the remove once merged in,
/// which is exactly the OR-Set's "add wins" guarantee.
///
/// Serializes as `{elements: [[elem, tag], ...], tombstones: [[elem, tag], ...]}`
/// per spec §4.1's canonical JSON shape; `BTreeSet` guarantees the
/// duplicate-free, deterministically ordered re-hydration the spec
/// requires ("must be re-hydrated without duplicates").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrSet<T: Ord + Clone> {
    elements: BTreeSet<(T, String)>,
    tombstones: BTreeSet<(T, String)>,
}

impl<T> OrSet<T>
where
    T: Ord + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            elements: BTreeSet::new(),
            tombstones: BTreeSet::new(),
        }
    }

    /// Add a fresh, live tuple for `element` tagged with `tag`. Callers
    /// must supply a tag unique to this actor/operation (see
    /// `ShoppingList`'s tag generator).
    pub fn add(&mut self, element: T, tag: impl Into<String>) {
        self.elements.insert((element, tag.into()));
    }

    /// Move every currently-live tuple for `element` into `tombstones`.
    pub fn remove(&mut self, element: &T) {
        let to_remove: Vec<_> = self
            .elements
            .iter()
            .filter(|(e, _)| e == element)
            .cloned()
            .collect();
        for entry in to_remove {
            self.elements.remove(&entry);
            self.tombstones.insert(entry);
        }
    }

    /// Visible iff at least one live tuple for `element` exists and is not
    /// tombstoned.
    pub fn contains(&self, element: &T) -> bool {
        self.elements
            .iter()
            .any(|(e, _)| e == element)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl<T> Crdt for OrSet<T>
where
    T: Ord + Clone + std::fmt::Debug,
{
    fn merge(&mut self, other: &Self) {
        let elements: BTreeSet<_> = self.elements.union(&other.elements).cloned().collect();
        let tombstones: BTreeSet<_> = self
            .tombstones
            .union(&other.tombstones)
            .cloned()
            .collect();

        // Any element tombstoned on either side is gone on both, per the
        // standard OR-Set merge: union elements, union tombstones, then
        // elements minus tombstones.
        self.elements = elements.difference(&tombstones).cloned().collect();
        self.tombstones = tombstones;
    }
}

use serde::{Deserialize, Serialize};

pub mod g_counter;
pub mod or_set;
pub mod pn_counter;
pub mod shopping_list;

pub use g_counter::GCounter;
pub use or_set::OrSet;
pub use pn_counter::PnCounter;
pub use shopping_list::{ItemCrdt, ItemView, ShoppingList};

/// Conflict-free replicated data types for a single shopping list.
///
/// Every type in this crate satisfies the three CvRDT laws under `merge`:
/// associativity, commutativity and idempotency. Merge never fails and
/// never reads or writes outside `self`/`other` — these are pure data
/// structures with no I/O.

/// Stable identifier of an edit origin (a client device acting on one
/// list), used as the actor key in both PN-counters.
///
/// Deliberately *not* derived from the list's own uuid: collapsing every
/// device's edits onto one counter slot would merge away concurrent
/// increments from different devices (see DESIGN.md, Open Question 2).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Errors raised by CRDT operations.
///
/// CRDT operations are pure: an error here never leaves the receiver
/// partially mutated, because malformed input is only ever encountered
/// while building a brand-new value (deserialization), not while mutating
/// an existing one.
#[derive(Debug, thiserror::Error)]
pub enum CrdtError {
    #[error("invalid CRDT state: {reason}")]
    InvalidState { reason: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CrdtResult<T> = Result<T, CrdtError>;

/// Common merge contract shared by every CRDT in this crate.
///
/// `merge` must be commutative, associative and idempotent; `verify_laws`
/// is a test helper that checks all three directly on arbitrary instances.
pub trait Crdt: Clone + PartialEq + std::fmt::Debug {
    fn merge(&mut self, other: &Self);

    fn merged(mut self, other: &Self) -> Self {
        self.merge(other);
        self
    }
}

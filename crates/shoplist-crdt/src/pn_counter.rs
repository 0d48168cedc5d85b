use crate::{ActorId, Crdt, GCounter};
use serde::{Deserialize, Serialize};

/// Increment/decrement counter built from two grow-only counters.
///
/// `update(actor, delta)` routes a positive delta into `positive` and a
/// negative delta into `negative`; the displayed value is `max(0, value())`
/// but the internal, unclamped value (which may be negative) is preserved
/// across merges, per spec §4.1: "internal values are not clamped; a merge
/// may reveal a larger negative."
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnCounter {
    positive: GCounter,
    negative: GCounter,
}

impl PnCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a signed delta on behalf of `actor`. A zero delta is a no-op.
    pub fn update(&mut self, actor: &ActorId, delta: i64) {
        match delta.cmp(&0) {
            std::cmp::Ordering::Greater => self.positive.increment(actor, delta as u64),
            std::cmp::Ordering::Less => self.negative.increment(actor, delta.unsigned_abs()),
            std::cmp::Ordering::Equal => {}
        }
    }

    /// Raw value `positive - negative`, which may be negative.
    pub fn raw_value(&self) -> i64 {
        self.positive.value() as i64 - self.negative.value() as i64
    }

    /// Displayed value, clamped to `>= 0` per spec §4.1/§8 property 5.
    pub fn value(&self) -> u64 {
        self.raw_value().max(0) as u64
    }

    pub fn positive(&self) -> &GCounter {
        &self.positive
    }

    pub fn negative(&self) -> &GCounter {
        &self.negative
    }
}

impl Crdt for PnCounter {
    fn merge(&mut self, other: &Self) {
        self.positive.merge(&other.positive);
        self.negative.merge(&other.negative);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::law_tests::*;

    fn actor(n: &str) -> ActorId {
        ActorId::new(n)
    }

    #[test]
    fn positive_and_negative_deltas_route_correctly() {
        let mut c = PnCounter::new();
        c.update(&actor("a"), 5);
        c.update(&actor("a"), -2);
        assert_eq!(c.raw_value(), 3);
        assert_eq!(c.value(), 3);
    }

    #[test]
    fn clamped_value_never_goes_negative_but_raw_does() {
        let mut c = PnCounter::new();
        c.update(&actor("a"), -10);
        assert_eq!(c.raw_value(), -10);
        assert_eq!(c.value(), 0);
    }

    #[test]
    fn merge_can_reveal_a_larger_negative() {
        let mut c1 = PnCounter::new();
        c1.update(&actor("a"), 5);

        let mut c2 = PnCounter::new();
        c2.update(&actor("b"), -20);

        c1.merge(&c2);
        assert_eq!(c1.raw_value(), -15);
        assert_eq!(c1.value(), 0);
    }

    #[test]
    fn satisfies_crdt_laws() {
        let mut a = PnCounter::new();
        a.update(&actor("a"), 5);
        a.update(&actor("a"), -2);

        let mut b = PnCounter::new();
        b.update(&actor("b"), 3);

        let mut c = PnCounter::new();
        c.update(&actor("a"), 1);
        c.update(&actor("c"), -4);

        assert!(idempotent(&a));
        assert!(commutative(&a, &b));
        assert!(associative(&a, &b, &c));
    }

    #[test]
    fn json_shape_matches_wire_contract() {
        let mut c = PnCounter::new();
        c.update(&actor("a"), 5);
        let v = serde_json::to_value(&c).unwrap();
        assert!(v.get("positive").unwrap().get("counts").is_some());
        assert!(v.get("negative").unwrap().get("counts").is_some());
    }
}

//! Size-based combat resolution
//!
//! Entities declare what they can do in a fight through three small traits
//! instead of being probed by tag or type:
//! - [`OwnerIdentifiable`]: stable id plus the agent that owns it
//! - [`SizeProvider`]: logical radius (None means "not a combat participant")
//! - [`Defeatable`]: whether the entity can currently be defeated
//!
//! The resolver itself is pure. It reads two participants and returns a
//! [`Verdict`]; applying the defeat is the caller's job.

use super::state::EntityId;
use crate::tuning::CombatTuning;

/// Stable identity and ownership
pub trait OwnerIdentifiable {
    fn entity_id(&self) -> EntityId;
    /// Agent that owns this entity (an agent owns itself)
    fn owner_id(&self) -> EntityId;
}

/// Authoritative size for combat comparisons
pub trait SizeProvider {
    /// Logical radius. Must never be a smoothed/visual value.
    fn combat_radius(&self) -> Option<f32>;
}

/// Something combat can knock out
pub trait Defeatable {
    fn is_defeated(&self) -> bool;
    /// False while defeated or invulnerable
    fn can_be_defeated(&self) -> bool {
        !self.is_defeated()
    }
}

/// Everything the resolver needs from one side of a contact
pub trait Combatant: OwnerIdentifiable + SizeProvider + Defeatable {}

impl<T: OwnerIdentifiable + SizeProvider + Defeatable> Combatant for T {}

/// Outcome of a decisive contact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub winner: EntityId,
    pub loser: EntityId,
}

/// Why a contact produced no verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoVerdict {
    /// The other participant performs the resolution for this contact
    NotCanonical,
    /// One side is already defeated or protected
    Ineligible,
    SameOwner,
    /// One side has no size
    NotCombatant,
    /// Radii within the tie epsilon
    Tie,
    /// Bigger, but not by the kill ratio
    BelowRatio,
}

/// Canonical combat rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatResolver {
    kill_ratio: f32,
    tie_epsilon: f32,
}

impl Default for CombatResolver {
    fn default() -> Self {
        Self::new(&CombatTuning::default())
    }
}

impl CombatResolver {
    /// A kill ratio of 1.0 or less (or NaN) falls back to the default
    pub fn new(tuning: &CombatTuning) -> Self {
        let kill_ratio = if tuning.kill_ratio > 1.0 {
            tuning.kill_ratio
        } else {
            CombatTuning::default().kill_ratio
        };
        Self {
            kill_ratio,
            tie_epsilon: tuning.tie_epsilon.max(0.0),
        }
    }

    pub fn kill_ratio(&self) -> f32 {
        self.kill_ratio
    }

    pub fn tie_epsilon(&self) -> f32 {
        self.tie_epsilon
    }

    /// Resolve a contact as seen from `a`'s side.
    ///
    /// Contacts are delivered from both participants; only the side with the
    /// lower id resolves, the other side gets `NotCanonical`.
    pub fn resolve(
        &self,
        a: &(impl Combatant + ?Sized),
        b: &(impl Combatant + ?Sized),
    ) -> Result<Verdict, NoVerdict> {
        if a.entity_id() >= b.entity_id() {
            return Err(NoVerdict::NotCanonical);
        }
        if !a.can_be_defeated() || !b.can_be_defeated() {
            return Err(NoVerdict::Ineligible);
        }
        if a.owner_id() == b.owner_id() {
            return Err(NoVerdict::SameOwner);
        }
        let (Some(ra), Some(rb)) = (a.combat_radius(), b.combat_radius()) else {
            return Err(NoVerdict::NotCombatant);
        };
        self.compare(ra, rb).map(|a_wins| {
            if a_wins {
                Verdict {
                    winner: a.entity_id(),
                    loser: b.entity_id(),
                }
            } else {
                Verdict {
                    winner: b.entity_id(),
                    loser: a.entity_id(),
                }
            }
        })
    }

    /// Compare two radii. `Ok(true)` means the first one wins.
    pub fn compare(&self, ra: f32, rb: f32) -> Result<bool, NoVerdict> {
        if (ra - rb).abs() <= self.tie_epsilon {
            return Err(NoVerdict::Tie);
        }
        let (larger, smaller) = if ra > rb { (ra, rb) } else { (rb, ra) };
        if larger >= smaller * self.kill_ratio {
            Ok(ra > rb)
        } else {
            Err(NoVerdict::BelowRatio)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    struct Dummy {
        id: EntityId,
        owner: EntityId,
        radius: Option<f32>,
        defeated: bool,
    }

    impl Dummy {
        fn new(id: EntityId, radius: f32) -> Self {
            Self {
                id,
                owner: id + 100,
                radius: Some(radius),
                defeated: false,
            }
        }
    }

    impl OwnerIdentifiable for Dummy {
        fn entity_id(&self) -> EntityId {
            self.id
        }
        fn owner_id(&self) -> EntityId {
            self.owner
        }
    }

    impl SizeProvider for Dummy {
        fn combat_radius(&self) -> Option<f32> {
            self.radius
        }
    }

    impl Defeatable for Dummy {
        fn is_defeated(&self) -> bool {
            self.defeated
        }
    }

    #[test]
    fn test_ratio_reached_defeats_smaller() {
        let r = CombatResolver::default();
        let a = Dummy::new(1, 1.10);
        let b = Dummy::new(2, 1.0);
        assert_eq!(r.resolve(&a, &b), Ok(Verdict { winner: 1, loser: 2 }));
    }

    #[test]
    fn test_below_ratio_is_no_defeat() {
        let r = CombatResolver::default();
        let a = Dummy::new(1, 1.04);
        let b = Dummy::new(2, 1.0);
        assert_eq!(r.resolve(&a, &b), Err(NoVerdict::BelowRatio));
    }

    #[test]
    fn test_ratio_of_one_falls_back_to_default() {
        for kill_ratio in [1.0, 0.5, f32::NAN] {
            let r = CombatResolver::new(&CombatTuning {
                kill_ratio,
                tie_epsilon: 0.005,
            });
            assert_eq!(r.kill_ratio(), CombatTuning::default().kill_ratio);
            assert_eq!(r.compare(1.01, 1.0), Err(NoVerdict::BelowRatio));
        }
    }

    #[test]
    fn test_large_sizes() {
        let r = CombatResolver::default();
        // 10 >= 9 * 1.05
        assert_eq!(r.compare(10.0, 9.0), Ok(true));
        assert_eq!(r.compare(9.0, 10.0), Ok(false));
    }

    #[test]
    fn test_tie_within_epsilon() {
        let r = CombatResolver::default();
        let a = Dummy::new(1, 1.000);
        let b = Dummy::new(2, 1.004);
        assert_eq!(r.resolve(&a, &b), Err(NoVerdict::Tie));
    }

    #[test]
    fn test_smaller_id_side_loses_when_smaller() {
        let r = CombatResolver::default();
        let a = Dummy::new(1, 0.5);
        let b = Dummy::new(2, 2.0);
        assert_eq!(r.resolve(&a, &b), Ok(Verdict { winner: 2, loser: 1 }));
    }

    #[test]
    fn test_only_lower_id_resolves() {
        let r = CombatResolver::default();
        let x = Dummy::new(5, 2.0);
        let y = Dummy::new(7, 1.0);
        let outcomes = [r.resolve(&x, &y), r.resolve(&y, &x)];
        let verdicts = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(verdicts, 1);
        assert_eq!(outcomes[1], Err(NoVerdict::NotCanonical));
    }

    #[test]
    fn test_same_owner_ignored() {
        let r = CombatResolver::default();
        let mut a = Dummy::new(1, 3.0);
        let mut b = Dummy::new(2, 0.2);
        a.owner = 10;
        b.owner = 10;
        assert_eq!(r.resolve(&a, &b), Err(NoVerdict::SameOwner));
    }

    #[test]
    fn test_defeated_side_ignored() {
        let r = CombatResolver::default();
        let a = Dummy::new(1, 3.0);
        let mut b = Dummy::new(2, 0.2);
        b.defeated = true;
        assert_eq!(r.resolve(&a, &b), Err(NoVerdict::Ineligible));
    }

    #[test]
    fn test_missing_size_skipped() {
        let r = CombatResolver::default();
        let a = Dummy::new(1, 3.0);
        let mut b = Dummy::new(2, 0.2);
        b.radius = None;
        assert_eq!(r.resolve(&a, &b), Err(NoVerdict::NotCombatant));
    }

    proptest! {
        #[test]
        fn prop_at_most_one_verdict_per_contact(
            ra in 0.01f32..5.0,
            rb in 0.01f32..5.0,
            ida in 1u32..1000,
            idb in 1u32..1000,
        ) {
            let r = CombatResolver::default();
            let a = Dummy::new(ida, ra);
            let b = Dummy::new(idb, rb);
            let count = [r.resolve(&a, &b), r.resolve(&b, &a)]
                .iter()
                .filter(|o| o.is_ok())
                .count();
            prop_assert!(count <= 1);
        }

        #[test]
        fn prop_ties_never_defeat(r0 in 0.01f32..5.0, d in 0.0f32..0.004) {
            let r = CombatResolver::default();
            prop_assert_eq!(r.compare(r0, r0 + d), Err(NoVerdict::Tie));
        }
    }
}

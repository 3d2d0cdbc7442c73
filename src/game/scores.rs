use crate::game::judgment::{ScoreTable, Tier};
use serde::Serialize;
use std::collections::BTreeMap;

pub const MAX_HEALTH: i32 = 1000;

/// Running score and health. Health is clamped from above only; the session
/// loop fails the play-through as soon as it reaches zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScoreState {
    pub score: i64,
    pub health: i32,
    pub judgment_counts: BTreeMap<Tier, u32>,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self {
            score: 0,
            health: MAX_HEALTH,
            judgment_counts: Tier::ALL.iter().map(|t| (*t, 0)).collect(),
        }
    }
}

#[inline(always)]
pub fn apply_health(health: i32, delta: i32) -> i32 {
    (health + delta).min(MAX_HEALTH)
}

impl ScoreState {
    /// Pure reducer: the state after one more outcome.
    pub fn apply(&self, tier: Tier, table: &ScoreTable) -> ScoreState {
        let mut next = self.clone();
        next.record(tier, table);
        next
    }

    pub fn record(&mut self, tier: Tier, table: &ScoreTable) {
        self.score += table.points_for(tier);
        self.health = apply_health(self.health, tier.health_delta());
        *self.judgment_counts.entry(tier).or_insert(0) += 1;
    }

    #[inline(always)]
    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn count(&self, tier: Tier) -> u32 {
        self.judgment_counts.get(&tier).copied().unwrap_or(0)
    }

    pub fn total_judged(&self) -> u32 {
        self.judgment_counts.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tier_strategy() -> impl Strategy<Value = Tier> {
        prop::sample::select(Tier::ALL.to_vec())
    }

    #[test]
    fn perfect_from_full_health_stays_clamped() {
        let mut state = ScoreState::default();
        state.record(Tier::Perfect, &ScoreTable::default());
        assert_eq!(state.score, 300);
        assert_eq!(state.health, MAX_HEALTH);
        assert_eq!(state.count(Tier::Perfect), 1);
    }

    #[test]
    fn miss_drains_health_without_floor() {
        let start = ScoreState {
            health: 5,
            ..ScoreState::default()
        };
        let next = start.apply(Tier::Miss, &ScoreTable::default());
        assert_eq!(next.score, 0);
        assert_eq!(next.health, -5);
        // The input state is untouched.
        assert_eq!(start.health, 5);
    }

    #[test]
    fn death_is_at_or_below_zero() {
        let mut state = ScoreState {
            health: 10,
            ..ScoreState::default()
        };
        state.record(Tier::Miss, &ScoreTable::default());
        assert_eq!(state.health, 0);
        assert!(state.is_dead());
    }

    proptest! {
        #[test]
        fn health_never_exceeds_max(tiers in prop::collection::vec(tier_strategy(), 0..200)) {
            let table = ScoreTable::default();
            let mut state = ScoreState::default();
            for tier in tiers {
                state.record(tier, &table);
                prop_assert!(state.health <= MAX_HEALTH);
            }
        }

        #[test]
        fn replay_is_deterministic(tiers in prop::collection::vec(tier_strategy(), 0..200)) {
            let table = ScoreTable::default();
            let mut a = ScoreState::default();
            for tier in &tiers {
                a.record(*tier, &table);
            }
            let b = tiers
                .iter()
                .fold(ScoreState::default(), |state, tier| state.apply(*tier, &table));
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(a.total_judged() as usize, tiers.len());
        }

        #[test]
        fn score_accumulates_unclamped(n in 0usize..500) {
            let table = ScoreTable::default();
            let mut state = ScoreState::default();
            for _ in 0..n {
                state.record(Tier::PlusPerfect, &table);
            }
            prop_assert_eq!(state.score, n as i64 * table.plus_perfect);
        }
    }
}

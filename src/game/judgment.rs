use crate::core::input::Lane;
use crate::game::note::NoteId;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Tier {
    PlusPerfect, // W1
    Perfect,     // W2
    Great,       // W3
    Good,        // W4
    Miss,
}

impl Tier {
    pub const ALL: [Tier; 5] = [Tier::PlusPerfect, Tier::Perfect, Tier::Great, Tier::Good, Tier::Miss];

    pub const fn health_delta(self) -> i32 {
        match self {
            Tier::PlusPerfect => 5,
            Tier::Perfect => 3,
            Tier::Great => 1,
            Tier::Good => 0,
            Tier::Miss => -10,
        }
    }
}

/// Hit windows in milliseconds, symmetric around the target time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct JudgeWindows {
    pub plus_perfect: i64,
    pub perfect: i64,
    pub great: i64,
    pub good: i64,
    pub miss: i64,
}

impl Default for JudgeWindows {
    fn default() -> Self {
        Self {
            plus_perfect: 16,
            perfect: 40,
            great: 73,
            good: 103,
            miss: 150,
        }
    }
}

impl JudgeWindows {
    /// Tiers must be strictly nested: W1 < W2 < W3 < W4 < W_miss.
    pub fn is_valid(&self) -> bool {
        0 <= self.plus_perfect
            && self.plus_perfect < self.perfect
            && self.perfect < self.great
            && self.great < self.good
            && self.good < self.miss
    }

    /// Classifies an absolute offset. Bounds are inclusive on the tighter tier;
    /// anything past W4 is a Miss, including offsets past the miss window.
    pub fn classify(&self, hit_window: i64) -> Tier {
        if hit_window <= self.plus_perfect {
            Tier::PlusPerfect
        } else if hit_window <= self.perfect {
            Tier::Perfect
        } else if hit_window <= self.great {
            Tier::Great
        } else if hit_window <= self.good {
            Tier::Good
        } else {
            Tier::Miss
        }
    }
}

/// Score awarded per tier.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScoreTable {
    pub plus_perfect: i64,
    pub perfect: i64,
    pub great: i64,
    pub good: i64,
    pub miss: i64,
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            plus_perfect: 320,
            perfect: 300,
            great: 200,
            good: 100,
            miss: 0,
        }
    }
}

impl ScoreTable {
    pub fn points_for(&self, tier: Tier) -> i64 {
        match tier {
            Tier::PlusPerfect => self.plus_perfect,
            Tier::Perfect => self.perfect,
            Tier::Great => self.great,
            Tier::Good => self.good,
            Tier::Miss => self.miss,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Cause {
    Press,
    Release,
    Timeout,
    Auto,
}

/// One note's verdict. Applied to the score tracker immediately, then dropped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Judgment {
    pub note: NoteId,
    pub lane: Lane,
    pub tier: Tier,
    /// Event time minus target time; positive is late.
    pub offset_ms: i64,
    pub cause: Cause,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_windows_are_nested() {
        assert!(JudgeWindows::default().is_valid());
        let broken = JudgeWindows {
            perfect: 16,
            ..JudgeWindows::default()
        };
        assert!(!broken.is_valid());
    }

    #[test]
    fn boundaries_are_inclusive_on_tighter_tier() {
        let w = JudgeWindows::default();
        assert_eq!(w.classify(0), Tier::PlusPerfect);
        assert_eq!(w.classify(w.plus_perfect), Tier::PlusPerfect);
        assert_eq!(w.classify(w.plus_perfect + 1), Tier::Perfect);
        assert_eq!(w.classify(w.perfect), Tier::Perfect);
        assert_eq!(w.classify(w.perfect + 1), Tier::Great);
        assert_eq!(w.classify(w.great), Tier::Great);
        assert_eq!(w.classify(w.good), Tier::Good);
        assert_eq!(w.classify(w.good + 1), Tier::Miss);
        assert_eq!(w.classify(w.miss), Tier::Miss);
        assert_eq!(w.classify(w.miss * 10), Tier::Miss);
    }

    #[test]
    fn health_table() {
        let deltas: Vec<i32> = Tier::ALL.iter().map(|t| t.health_delta()).collect();
        assert_eq!(deltas, vec![5, 3, 1, 0, -10]);
    }

    #[test]
    fn score_table_lookup() {
        let table = ScoreTable::default();
        assert_eq!(table.points_for(Tier::Perfect), 300);
        assert_eq!(table.points_for(Tier::Miss), 0);
    }
}

use crate::game::chart::Chart;
use crate::game::judgment::{Cause, Judgment, Tier};
use crate::game::note::{NoteId, NoteKind};
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use winit::keyboard::KeyCode;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Pool {
    Pending,
    Active,
    Resolved,
}

/// Which Hold note each physical key is currently holding down.
#[derive(Clone, Debug, Default)]
pub struct HeldNotes {
    by_key: HashMap<KeyCode, NoteId>,
}

impl HeldNotes {
    /// Returns `false` (and records nothing) if `key` already holds a note.
    pub fn capture(&mut self, key: KeyCode, note: NoteId) -> bool {
        if self.by_key.contains_key(&key) {
            return false;
        }
        self.by_key.insert(key, note);
        true
    }

    pub fn release(&mut self, key: KeyCode) -> Option<NoteId> {
        self.by_key.remove(&key)
    }

    pub fn is_holding(&self, key: KeyCode) -> bool {
        self.by_key.contains_key(&key)
    }

    pub fn is_captured(&self, note: NoteId) -> bool {
        self.by_key.values().any(|held| *held == note)
    }

    fn forget(&mut self, note: NoteId) {
        self.by_key.retain(|_, held| *held != note);
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyCode, &NoteId)> {
        self.by_key.iter()
    }
}

/// Three disjoint note pools. Every note of the chart sits in exactly one of
/// them, and only ever moves Pending -> Active -> Resolved.
#[derive(Clone, Debug)]
pub struct NotePools {
    pending: Vec<NoteId>,
    active: Vec<NoteId>,
    resolved: Vec<NoteId>,
    membership: Vec<Pool>,
}

impl NotePools {
    pub fn new(note_count: usize) -> Self {
        Self {
            pending: (0..note_count).map(NoteId).collect(),
            active: Vec::new(),
            resolved: Vec::with_capacity(note_count),
            membership: vec![Pool::Pending; note_count],
        }
    }

    pub fn pending(&self) -> &[NoteId] {
        &self.pending
    }

    /// Active notes in pool order, which is also judgement scan order.
    pub fn active(&self) -> &[NoteId] {
        &self.active
    }

    pub fn resolved(&self) -> &[NoteId] {
        &self.resolved
    }

    #[inline(always)]
    pub fn pool_of(&self, id: NoteId) -> Pool {
        self.membership[id.0]
    }

    /// Nothing left to show or judge.
    pub fn is_finished(&self) -> bool {
        self.pending.is_empty() && self.active.is_empty()
    }

    /// True when the three lists and the membership table agree.
    pub fn is_partition(&self) -> bool {
        let total = self.pending.len() + self.active.len() + self.resolved.len();
        total == self.membership.len()
            && self.pending.iter().all(|id| self.membership[id.0] == Pool::Pending)
            && self.active.iter().all(|id| self.membership[id.0] == Pool::Active)
            && self.resolved.iter().all(|id| self.membership[id.0] == Pool::Resolved)
    }

    /// Moves every pending note whose target is within `lead_time` of `now`
    /// into the active pool. Returns how many moved.
    pub fn advance(&mut self, chart: &Chart, now: i64, lead_time: i64) -> usize {
        let membership = &mut self.membership;
        let active = &mut self.active;
        let before = self.pending.len();

        self.pending.retain(|&id| {
            if chart.note(id).time() - now > lead_time {
                return true;
            }
            debug_assert_eq!(membership[id.0], Pool::Pending);
            membership[id.0] = Pool::Active;
            active.push(id);
            false
        });

        before - self.pending.len()
    }

    /// Active -> Resolved.
    pub fn resolve(&mut self, id: NoteId) {
        debug_assert_eq!(self.membership[id.0], Pool::Active, "resolving a note that is not active");
        let Some(position) = self.active.iter().position(|&a| a == id) else {
            return;
        };
        self.active.remove(position);
        self.membership[id.0] = Pool::Resolved;
        self.resolved.push(id);
    }

    /// Force-resolves every active note whose chance has passed:
    /// - taps, and holds never pressed, once `now - time > miss_window`;
    /// - pressed holds never released, once `now - end_time > miss_window`.
    ///
    /// Running it twice for the same `now` yields nothing the second time.
    pub fn expire(
        &mut self,
        chart: &Chart,
        held: &mut HeldNotes,
        now: i64,
        miss_window: i64,
    ) -> Vec<Judgment> {
        let expired: Vec<(NoteId, i64)> = self
            .active
            .iter()
            .filter_map(|&id| {
                let note = chart.note(id);
                let target = match note.kind() {
                    NoteKind::Tap { time } => time,
                    NoteKind::Hold { time, end_time } => {
                        if held.is_captured(id) {
                            end_time
                        } else {
                            time
                        }
                    }
                };
                (now - target > miss_window).then_some((id, now - target))
            })
            .collect();

        expired
            .into_iter()
            .map(|(id, offset_ms)| {
                held.forget(id);
                self.resolve(id);
                let lane = chart.note(id).lane();
                debug!("MISSED (timeout): note {} lane {:?}, {}ms late", id.0, lane, offset_ms);
                Judgment {
                    note: id,
                    lane,
                    tier: Tier::Miss,
                    offset_ms,
                    cause: Cause::Timeout,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::Lane;
    use crate::game::note::Note;

    fn chart() -> Chart {
        Chart::new(
            "pools",
            "a.ogg",
            vec![
                Note::tap(Lane::S, 1000),
                Note::hold(Lane::D, 1500, 2500).unwrap(),
                Note::tap(Lane::F, 5000),
            ],
        )
    }

    #[test]
    fn starts_all_pending() {
        let pools = NotePools::new(3);
        assert_eq!(pools.pending().len(), 3);
        assert!(pools.active().is_empty());
        assert!(pools.is_partition());
        assert!(!pools.is_finished());
    }

    #[test]
    fn advance_uses_lead_time_and_is_idempotent() {
        let chart = chart();
        let mut pools = NotePools::new(chart.len());
        assert_eq!(pools.advance(&chart, 0, 999), 0);
        assert_eq!(pools.advance(&chart, 0, 1000), 1);
        assert_eq!(pools.advance(&chart, 0, 1000), 0);
        assert_eq!(pools.advance(&chart, 500, 1000), 1);
        assert_eq!(pools.active(), &[NoteId(0), NoteId(1)]);
        assert_eq!(pools.pool_of(NoteId(2)), Pool::Pending);
        assert!(pools.is_partition());
    }

    #[test]
    fn advance_keeps_pool_order_for_unsorted_charts() {
        let chart = Chart::new(
            "unsorted",
            "a.ogg",
            vec![Note::tap(Lane::S, 900), Note::tap(Lane::S, 100)],
        );
        let mut pools = NotePools::new(chart.len());
        pools.advance(&chart, 0, 2000);
        assert_eq!(pools.active(), &[NoteId(0), NoteId(1)]);
    }

    #[test]
    fn expire_misses_late_taps_only_past_window() {
        let chart = chart();
        let mut pools = NotePools::new(chart.len());
        let mut held = HeldNotes::default();
        pools.advance(&chart, 1000, 2000);

        assert!(pools.expire(&chart, &mut held, 1150, 150).is_empty());
        let missed = pools.expire(&chart, &mut held, 1151, 150);
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].note, NoteId(0));
        assert_eq!(missed[0].tier, Tier::Miss);
        assert_eq!(missed[0].cause, Cause::Timeout);
        assert_eq!(pools.pool_of(NoteId(0)), Pool::Resolved);
    }

    #[test]
    fn expire_is_idempotent_at_same_time() {
        let chart = chart();
        let mut pools = NotePools::new(chart.len());
        let mut held = HeldNotes::default();
        pools.advance(&chart, 1700, 2000);

        let first = pools.expire(&chart, &mut held, 1700, 150);
        let second = pools.expire(&chart, &mut held, 1700, 150);
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert_eq!(pools.resolved().len(), 2);
        assert!(pools.is_partition());
    }

    #[test]
    fn captured_hold_waits_for_release_window() {
        let chart = chart();
        let mut pools = NotePools::new(chart.len());
        let mut held = HeldNotes::default();
        pools.advance(&chart, 1500, 2000);
        pools.resolve(NoteId(0));
        assert!(held.capture(KeyCode::KeyD, NoteId(1)));

        assert!(pools.expire(&chart, &mut held, 2000, 150).is_empty());
        assert!(pools.expire(&chart, &mut held, 2650, 150).is_empty());
        let missed = pools.expire(&chart, &mut held, 2651, 150);
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].offset_ms, 151);
        assert!(held.is_empty());
    }

    #[test]
    fn held_table_allows_one_note_per_key() {
        let mut held = HeldNotes::default();
        assert!(held.capture(KeyCode::KeyJ, NoteId(4)));
        assert!(!held.capture(KeyCode::KeyJ, NoteId(5)));
        assert!(held.is_holding(KeyCode::KeyJ));
        assert!(held.is_captured(NoteId(4)));
        assert_eq!(held.release(KeyCode::KeyJ), Some(NoteId(4)));
        assert_eq!(held.release(KeyCode::KeyJ), None);
    }
}

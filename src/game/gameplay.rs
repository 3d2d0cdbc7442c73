use crate::core::input::{InputEvent, LANE_COUNT, Transition};
use crate::game::chart::Chart;
use crate::game::judgment::{Cause, JudgeWindows, Judgment, ScoreTable, Tier};
use crate::game::note::{NoteId, NoteKind};
use crate::game::pools::{HeldNotes, NotePools};
use crate::game::scores::ScoreState;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_LEAD_TIME_MS: i64 = 2000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    pub windows: JudgeWindows,
    pub scoring: ScoreTable,
    /// How long before its target a note becomes visible and hittable.
    pub lead_time_ms: i64,
    pub auto_play: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            windows: JudgeWindows::default(),
            scoring: ScoreTable::default(),
            lead_time_ms: DEFAULT_LEAD_TIME_MS,
            auto_play: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Passed,
    Failed,
    Quit,
}

/// Read-only view of the session for the surrounding layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub score: i64,
    pub health: i32,
    pub elapsed_ms: i64,
    pub outcome: Option<Outcome>,
}

/// One tick's input bucketed per lane, in lane order, arrival order kept
/// within a lane. Keys that are not bound to a lane are dropped.
#[derive(Clone, Debug, Default)]
pub struct FrameInput {
    per_lane: [Vec<InputEvent>; LANE_COUNT],
}

impl FrameInput {
    pub fn group(events: &[InputEvent]) -> Self {
        let mut input = Self::default();
        for event in events {
            if let Some(lane) = event.lane() {
                input.per_lane[lane.index()].push(*event);
            }
        }
        input
    }

    pub fn iter(&self) -> impl Iterator<Item = &InputEvent> {
        self.per_lane.iter().flatten()
    }

    pub fn is_empty(&self) -> bool {
        self.per_lane.iter().all(Vec::is_empty)
    }
}

fn judge_press(
    chart: &Chart,
    pools: &mut NotePools,
    held: &mut HeldNotes,
    event: &InputEvent,
    windows: &JudgeWindows,
    matched_this_frame: &mut HashSet<NoteId>,
) -> Option<Judgment> {
    let lane = event.lane()?;
    if held.is_holding(event.key) {
        // A second press without a release in between: out-of-order delivery.
        debug!("Ignoring press on {:?}: key already holds a note.", event.key);
        return None;
    }

    // First eligible note in pool order wins, not the closest one.
    let note_id = pools.active().iter().copied().find(|&id| {
        let note = chart.note(id);
        note.lane() == lane
            && !matched_this_frame.contains(&id)
            && !held.is_captured(id)
            && (event.timestamp - note.time()).abs() <= windows.miss
    })?;
    matched_this_frame.insert(note_id);

    let note = chart.note(note_id);
    let offset_ms = event.timestamp - note.time();
    match note.kind() {
        NoteKind::Tap { .. } => {
            let tier = windows.classify(offset_ms.abs());
            pools.resolve(note_id);
            debug!(
                "JUDGED: note {}, lane {:?}, error {}ms, tier {:?}",
                note_id.0, lane, offset_ms, tier
            );
            Some(Judgment {
                note: note_id,
                lane,
                tier,
                offset_ms,
                cause: Cause::Press,
            })
        }
        NoteKind::Hold { .. } => {
            held.capture(event.key, note_id);
            debug!(
                "HOLD START: note {}, lane {:?}, error {}ms",
                note_id.0, lane, offset_ms
            );
            None
        }
    }
}

fn judge_release(
    chart: &Chart,
    pools: &mut NotePools,
    held: &mut HeldNotes,
    event: &InputEvent,
    windows: &JudgeWindows,
) -> Option<Judgment> {
    let note_id = held.release(event.key)?;
    let note = chart.note(note_id);
    let end_time = note.end_time().unwrap_or(note.time());
    let offset_ms = event.timestamp - end_time;
    let hit_window = offset_ms.abs();
    let tier = if hit_window <= windows.miss {
        windows.classify(hit_window)
    } else {
        Tier::Miss
    };

    pools.resolve(note_id);
    debug!(
        "HOLD END: note {}, lane {:?}, error {}ms, tier {:?}",
        note_id.0,
        note.lane(),
        offset_ms,
        tier
    );
    Some(Judgment {
        note: note_id,
        lane: note.lane(),
        tier,
        offset_ms,
        cause: Cause::Release,
    })
}

/// Judges one tick's worth of input against the active pool. Each note is
/// matched at most once per tick; presses on empty lanes and releases with no
/// captured hold produce nothing.
pub fn judge_frame(
    chart: &Chart,
    pools: &mut NotePools,
    held: &mut HeldNotes,
    input: &FrameInput,
    windows: &JudgeWindows,
) -> Vec<Judgment> {
    let mut matched_this_frame = HashSet::new();
    let mut judgments = Vec::new();

    for event in input.iter() {
        let judgment = match event.transition {
            Transition::Press => judge_press(chart, pools, held, event, windows, &mut matched_this_frame),
            Transition::Release => judge_release(chart, pools, held, event, windows),
        };
        judgments.extend(judgment);
    }

    judgments
}

/// Resolves every active note whose target time has arrived as PlusPerfect,
/// ignoring input entirely.
pub fn auto_play(chart: &Chart, pools: &mut NotePools, now: i64) -> Vec<Judgment> {
    let due: Vec<NoteId> = pools
        .active()
        .iter()
        .copied()
        .filter(|&id| now - chart.note(id).time() >= 0)
        .collect();

    due.into_iter()
        .map(|id| {
            pools.resolve(id);
            Judgment {
                note: id,
                lane: chart.note(id).lane(),
                tier: Tier::PlusPerfect,
                offset_ms: 0,
                cause: Cause::Auto,
            }
        })
        .collect()
}

/// One play-through. Owns the chart, the pools, the held-note table and the
/// score; `tick` is the whole per-frame pipeline.
pub struct Session {
    chart: Chart,
    config: SessionConfig,
    pools: NotePools,
    held: HeldNotes,
    score: ScoreState,
    elapsed_ms: i64,
    outcome: Option<Outcome>,
    last_judgments: Vec<Judgment>,
}

impl Session {
    pub fn new(chart: Chart, config: SessionConfig) -> Self {
        info!(
            "Initializing session for '{}' ({} notes, auto play: {}).",
            chart.title(),
            chart.len(),
            config.auto_play
        );
        if !config.windows.is_valid() {
            warn!("Judge windows are not strictly nested: {:?}", config.windows);
        }
        let pools = NotePools::new(chart.len());
        Self {
            chart,
            config,
            pools,
            held: HeldNotes::default(),
            score: ScoreState::default(),
            elapsed_ms: 0,
            outcome: None,
            last_judgments: Vec::new(),
        }
    }

    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pools(&self) -> &NotePools {
        &self.pools
    }

    pub fn held(&self) -> &HeldNotes {
        &self.held
    }

    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.elapsed_ms
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Judgments produced by the most recent tick.
    pub fn last_judgments(&self) -> &[Judgment] {
        &self.last_judgments
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            score: self.score.score,
            health: self.score.health,
            elapsed_ms: self.elapsed_ms,
            outcome: self.outcome,
        }
    }

    fn apply_judgments(&mut self, judgments: Vec<Judgment>) {
        for judgment in judgments {
            // Once health is gone the session is over; later verdicts in the
            // same tick no longer count.
            if !self.score.is_dead() {
                self.score.record(judgment.tier, &self.config.scoring);
            }
            self.last_judgments.push(judgment);
        }
    }

    fn check_termination(&self, quit_requested: bool) -> Option<Outcome> {
        if self.score.is_dead() {
            Some(Outcome::Failed)
        } else if quit_requested {
            Some(Outcome::Quit)
        } else if self.pools.is_finished() {
            Some(Outcome::Passed)
        } else {
            None
        }
    }

    /// Runs one tick at chart time `now`: spawn, judge, score, time out,
    /// then check for an end state. Ticks after the end are no-ops.
    pub fn tick(&mut self, now: i64, events: &[InputEvent], quit_requested: bool) -> Option<Outcome> {
        if self.outcome.is_some() {
            return self.outcome;
        }

        self.elapsed_ms = now;
        self.last_judgments.clear();

        let spawned = self.pools.advance(&self.chart, now, self.config.lead_time_ms);
        if spawned > 0 {
            debug!("{} notes became active at {}ms.", spawned, now);
        }

        let judgments = if self.config.auto_play {
            auto_play(&self.chart, &mut self.pools, now)
        } else {
            let input = FrameInput::group(events);
            judge_frame(&self.chart, &mut self.pools, &mut self.held, &input, &self.config.windows)
        };
        self.apply_judgments(judgments);

        let expired = self
            .pools
            .expire(&self.chart, &mut self.held, now, self.config.windows.miss);
        self.apply_judgments(expired);

        debug_assert!(self.pools.is_partition(), "note pools no longer partition the chart");

        self.outcome = self.check_termination(quit_requested);
        if let Some(outcome) = self.outcome {
            info!(
                "Session finished at {}ms: {:?} (score {}, health {}).",
                now, outcome, self.score.score, self.score.health
            );
        }
        self.outcome
    }

    /// Ends a running session as Quit without judging anything further.
    pub fn quit(&mut self) -> Outcome {
        let elapsed_ms = self.elapsed_ms;
        *self.outcome.get_or_insert_with(|| {
            info!("Session quit at {}ms.", elapsed_ms);
            Outcome::Quit
        })
    }
}

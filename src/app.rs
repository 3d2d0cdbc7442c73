use crate::config::Config;
use crate::core::clock::Clock;
use crate::core::input::{InputCapture, InputEvent, PAUSE_KEY, RawKeyTransition, Transition};
use crate::error::Result;
use crate::game::chart::Chart;
use crate::game::gameplay::{Outcome, Session, SessionState};
use crate::game::judgment::{Judgment, Tier};
use crate::game::pools::{HeldNotes, NotePools};
use crate::utils::tick::{TickCounter, TickScheduler};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct ControlFlags {
    pause: AtomicBool,
    resume: AtomicBool,
    quit: AtomicBool,
}

/// Shared handle for the surrounding layer to steer a running session.
/// Requests are picked up at the next tick boundary.
#[derive(Clone, Debug, Default)]
pub struct SessionControl {
    flags: Arc<ControlFlags>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_pause(&self) {
        self.flags.pause.store(true, Ordering::Relaxed);
    }

    pub fn request_resume(&self) {
        self.flags.resume.store(true, Ordering::Relaxed);
    }

    pub fn request_quit(&self) {
        self.flags.quit.store(true, Ordering::Relaxed);
    }

    fn take_pause(&self) -> bool {
        self.flags.pause.swap(false, Ordering::Relaxed)
    }

    fn take_resume(&self) -> bool {
        self.flags.resume.swap(false, Ordering::Relaxed)
    }

    fn take_quit(&self) -> bool {
        self.flags.quit.swap(false, Ordering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Phase {
    Running,
    Paused,
    /// Countdown before the clock runs again.
    Resuming,
}

/// What the rendering/audio layer gets to see after every tick.
pub struct FrameView<'a> {
    pub chart: &'a Chart,
    pub pools: &'a NotePools,
    pub held: &'a HeldNotes,
    pub state: SessionState,
    /// Judgments produced by this tick; empty while not running.
    pub judgments: &'a [Judgment],
    pub phase: Phase,
}

pub trait FrameObserver {
    fn on_frame(&mut self, frame: &FrameView<'_>);
}

impl FrameObserver for () {
    fn on_frame(&mut self, _frame: &FrameView<'_>) {}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub title: String,
    pub outcome: Outcome,
    pub score: i64,
    pub health: i32,
    pub elapsed_ms: i64,
    pub note_count: usize,
    pub judgments: BTreeMap<Tier, u32>,
}

impl SessionReport {
    fn from_session(session: &Session, outcome: Outcome) -> Self {
        let score = session.score();
        SessionReport {
            title: session.chart().title().to_string(),
            outcome,
            score: score.score,
            health: score.health,
            elapsed_ms: session.elapsed_ms(),
            note_count: session.chart().len(),
            judgments: score.judgment_counts.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

struct PauseState {
    phase: Phase,
    resume_at: Option<Instant>,
    resume_delay: Duration,
}

impl PauseState {
    fn new(resume_delay: Duration) -> Self {
        Self {
            phase: Phase::Running,
            resume_at: None,
            resume_delay,
        }
    }

    fn pause(&mut self, clock: &Clock) {
        if self.phase == Phase::Running && clock.pause() {
            info!("Paused at {}ms.", clock.now_ms());
            self.phase = Phase::Paused;
        }
    }

    fn request_resume(&mut self, now: Instant) {
        if self.phase == Phase::Paused {
            info!("Resuming in {:.1}s.", self.resume_delay.as_secs_f32());
            self.phase = Phase::Resuming;
            self.resume_at = Some(now + self.resume_delay);
        }
    }

    fn finish_countdown(&mut self, clock: &Clock, now: Instant) {
        if self.phase != Phase::Resuming || self.resume_at.is_some_and(|at| now < at) {
            return;
        }
        clock.resume();
        self.resume_at = None;
        self.phase = Phase::Running;
        info!("Resumed at {}ms.", clock.now_ms());
    }

    /// Routes one drained event that is not a pause-key press while running.
    /// Returns `true` if it asks to quit. Events that should reach the
    /// judgement pass are pushed onto `batch`.
    fn route(&mut self, event: InputEvent, batch: &mut Vec<InputEvent>) -> bool {
        match self.phase {
            Phase::Running => batch.push(event),
            Phase::Paused | Phase::Resuming if is_pause_press(&event) => {
                info!("Quit requested from pause.");
                return true;
            }
            Phase::Paused if event.transition == Transition::Press => self.request_resume(Instant::now()),
            Phase::Paused | Phase::Resuming => {
                debug!("Dropping {:?} on {:?} while paused.", event.transition, event.key);
            }
        }
        false
    }
}

#[inline]
fn is_pause_press(event: &InputEvent) -> bool {
    event.key == PAUSE_KEY && event.transition == Transition::Press
}

/// Judges everything drained so far, then stops the clock. Nothing is paused
/// if that tick already ended the session.
fn flush_and_pause(
    session: &mut Session,
    clock: &Clock,
    pause: &mut PauseState,
    batch: &mut Vec<InputEvent>,
    quit_requested: bool,
) -> Option<Outcome> {
    let outcome = session.tick(clock.now_ms(), batch, quit_requested);
    batch.clear();
    if outcome.is_none() {
        pause.pause(clock);
    }
    outcome
}

/// Runs one play-through on the calling thread at the configured tick rate.
/// Input arrives on `raw` from the windowing layer and is timestamped by a
/// capture thread against the session clock.
pub fn run_session(
    chart: Chart,
    config: &Config,
    control: &SessionControl,
    raw: Receiver<RawKeyTransition>,
    observer: &mut dyn FrameObserver,
) -> Result<SessionReport> {
    let clock = Arc::new(Clock::start());
    let (capture, events) = InputCapture::spawn(raw, clock.clone())?;

    let mut session = Session::new(chart, config.session_config());
    let mut scheduler = TickScheduler::new(config.tick_interval());
    let mut tick_counter = TickCounter::new();
    let mut pause = PauseState::new(config.resume_delay());
    let mut batch: Vec<InputEvent> = Vec::new();

    info!(
        "Session loop running at {} Hz (tick {:.2}ms).",
        config.tick_rate_hz,
        scheduler.period().as_secs_f64() * 1000.0
    );

    let outcome = loop {
        let woke = scheduler.wait();

        let mut quit_requested = control.take_quit();

        batch.clear();
        let mut outcome = None;
        let mut flushed = false;
        for event in events.try_iter() {
            if pause.phase == Phase::Running && is_pause_press(&event) {
                outcome = flush_and_pause(&mut session, &clock, &mut pause, &mut batch, quit_requested);
                flushed = true;
                if outcome.is_some() {
                    break;
                }
            } else {
                quit_requested |= pause.route(event, &mut batch);
            }
        }

        if outcome.is_none() && control.take_pause() && pause.phase == Phase::Running {
            outcome = flush_and_pause(&mut session, &clock, &mut pause, &mut batch, quit_requested);
            flushed = true;
        }
        if control.take_resume() {
            pause.request_resume(woke);
        }

        let mut ticked = flushed;
        if outcome.is_none() {
            pause.finish_countdown(&clock, woke);
            if pause.phase == Phase::Running {
                outcome = session.tick(clock.now_ms(), &batch, quit_requested);
                ticked = true;
            } else if quit_requested {
                outcome = Some(session.quit());
            }
        }

        observer.on_frame(&FrameView {
            chart: session.chart(),
            pools: session.pools(),
            held: session.held(),
            state: session.state(),
            judgments: if ticked { session.last_judgments() } else { &[] },
            phase: pause.phase,
        });

        if let Some(rate) = tick_counter.update() {
            let score = session.score();
            info!(
                "{} ticks/s | t={}ms | {:?} | score {} | health {} | active {} | pending {}",
                rate,
                session.elapsed_ms(),
                pause.phase,
                score.score,
                score.health,
                session.pools().active().len(),
                session.pools().pending().len()
            );
        }

        if let Some(outcome) = outcome {
            break outcome;
        }
    };

    capture.stop();
    let report = SessionReport::from_session(&session, outcome);
    info!(
        "'{}' ended: {:?}, score {}, health {}.",
        report.title, report.outcome, report.score, report.health
    );
    Ok(report)
}

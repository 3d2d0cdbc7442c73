use log::debug;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Monotonic "elapsed since chart start" source shared by the session loop and
/// the input capture thread.
///
/// Paused spans are subtracted from every reading, so notes neither time out
/// nor spawn early after a resume.
#[derive(Debug)]
pub struct Clock {
    inner: Mutex<ClockState>,
}

#[derive(Debug)]
struct ClockState {
    origin: Instant,
    paused_at: Option<Instant>,
    /// Finished pauses as `(start, length)`, oldest first.
    paused_spans: Vec<(Instant, Duration)>,
}

impl ClockState {
    /// Paused time that lies before `instant`, counting an open pause too.
    fn paused_before(&self, instant: Instant) -> Duration {
        let finished: Duration = self
            .paused_spans
            .iter()
            .map(|&(start, length)| instant.min(start + length).saturating_duration_since(start))
            .sum();
        let open = self
            .paused_at
            .map_or(Duration::ZERO, |start| instant.saturating_duration_since(start));
        finished + open
    }
}

impl Clock {
    pub fn start() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(origin: Instant) -> Self {
        Self {
            inner: Mutex::new(ClockState {
                origin,
                paused_at: None,
                paused_spans: Vec::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ClockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Chart time in milliseconds right now.
    #[inline]
    pub fn now_ms(&self) -> i64 {
        self.ms_at(Instant::now())
    }

    /// Chart time in milliseconds at `instant`. Only pauses that happened
    /// before `instant` are subtracted, so an instant inside a pause reads as
    /// the moment that pause began.
    pub fn ms_at(&self, instant: Instant) -> i64 {
        let state = self.state();
        let elapsed = instant
            .saturating_duration_since(state.origin)
            .saturating_sub(state.paused_before(instant));
        elapsed.as_millis() as i64
    }

    /// Returns `false` if the clock was already paused.
    pub fn pause(&self) -> bool {
        self.pause_at(Instant::now())
    }

    fn pause_at(&self, at: Instant) -> bool {
        let mut state = self.state();
        if state.paused_at.is_some() {
            return false;
        }
        state.paused_at = Some(at);
        debug!("Clock paused.");
        true
    }

    /// Returns `false` if the clock was not paused.
    pub fn resume(&self) -> bool {
        self.resume_at(Instant::now())
    }

    fn resume_at(&self, at: Instant) -> bool {
        let mut state = self.state();
        let Some(paused_at) = state.paused_at.take() else {
            return false;
        };
        let span = at.saturating_duration_since(paused_at);
        state.paused_spans.push((paused_at, span));
        debug!("Clock resumed after {:.3}s paused.", span.as_secs_f32());
        true
    }

    pub fn is_paused(&self) -> bool {
        self.state().paused_at.is_some()
    }

    /// Sum of all finished pauses.
    pub fn paused_total(&self) -> Duration {
        self.state().paused_spans.iter().map(|&(_, length)| length).sum()
    }
}

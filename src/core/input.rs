use crate::core::clock::Clock;
use crate::error::{Error, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::thread;
use std::time::{Duration, Instant};
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

pub const LANE_COUNT: usize = 7;

/// Opens the pause sub-state while running; quits while paused.
pub const PAUSE_KEY: KeyCode = KeyCode::Escape;

// How often the capture thread re-checks its stop signal while idle.
const CAPTURE_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum Lane {
    S = 0,
    D = 1,
    F = 2,
    Space = 3,
    J = 4,
    K = 5,
    L = 6,
}

impl Lane {
    pub const ALL: [Lane; LANE_COUNT] = [
        Lane::S,
        Lane::D,
        Lane::F,
        Lane::Space,
        Lane::J,
        Lane::K,
        Lane::L,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub fn from_index(index: usize) -> Option<Lane> {
        Self::ALL.get(index).copied()
    }

    /// The physical key bound to this lane.
    pub const fn key(self) -> KeyCode {
        match self {
            Lane::S => KeyCode::KeyS,
            Lane::D => KeyCode::KeyD,
            Lane::F => KeyCode::KeyF,
            Lane::Space => KeyCode::Space,
            Lane::J => KeyCode::KeyJ,
            Lane::K => KeyCode::KeyK,
            Lane::L => KeyCode::KeyL,
        }
    }
}

#[inline(always)]
pub fn lane_from_keycode(code: KeyCode) -> Option<Lane> {
    match code {
        KeyCode::KeyS => Some(Lane::S),
        KeyCode::KeyD => Some(Lane::D),
        KeyCode::KeyF => Some(Lane::F),
        KeyCode::Space => Some(Lane::Space),
        KeyCode::KeyJ => Some(Lane::J),
        KeyCode::KeyK => Some(Lane::K),
        KeyCode::KeyL => Some(Lane::L),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Press,
    Release,
}

/// A key transition stamped with chart time (ms). Consumed exactly once by the
/// judgement pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEvent {
    pub key: KeyCode,
    pub transition: Transition,
    pub timestamp: i64,
}

impl InputEvent {
    pub fn press(key: KeyCode, timestamp: i64) -> Self {
        Self { key, transition: Transition::Press, timestamp }
    }

    pub fn release(key: KeyCode, timestamp: i64) -> Self {
        Self { key, transition: Transition::Release, timestamp }
    }

    #[inline]
    pub fn lane(&self) -> Option<Lane> {
        lane_from_keycode(self.key)
    }
}

/// A transition as seen by the windowing layer, before it is placed on the
/// chart timeline.
#[derive(Clone, Copy, Debug)]
pub struct RawKeyTransition {
    pub key: KeyCode,
    pub transition: Transition,
    pub at: Instant,
}

/// Producer half handed to the windowing layer. Cheap to clone.
#[derive(Clone, Debug)]
pub struct KeyFeed {
    sender: Sender<RawKeyTransition>,
}

pub fn key_feed() -> (KeyFeed, Receiver<RawKeyTransition>) {
    let (sender, receiver) = channel();
    (KeyFeed { sender }, receiver)
}

impl KeyFeed {
    /// Returns `false` once the capture side is gone.
    pub fn send_at(&self, key: KeyCode, transition: Transition, at: Instant) -> bool {
        self.sender
            .send(RawKeyTransition { key, transition, at })
            .is_ok()
    }

    pub fn press(&self, key: KeyCode) -> bool {
        self.send_at(key, Transition::Press, Instant::now())
    }

    pub fn release(&self, key: KeyCode) -> bool {
        self.send_at(key, Transition::Release, Instant::now())
    }

    /// Forwards a winit keyboard event. OS auto-repeat presses are dropped so a
    /// held key never reads as a second press.
    pub fn send_key_event(&self, event: &KeyEvent) -> bool {
        let PhysicalKey::Code(code) = event.physical_key else {
            return false;
        };
        if event.state == ElementState::Pressed && event.repeat {
            return false;
        }
        let transition = match event.state {
            ElementState::Pressed => Transition::Press,
            ElementState::Released => Transition::Release,
        };
        self.send_at(code, transition, Instant::now())
    }
}

/// Handle to the background thread that stamps raw transitions against the
/// shared clock. Stopping (or dropping) the handle joins the thread.
pub struct InputCapture {
    thread: Option<thread::JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
}

impl InputCapture {
    pub fn spawn(
        raw: Receiver<RawKeyTransition>,
        clock: Arc<Clock>,
    ) -> Result<(Self, Receiver<InputEvent>)> {
        let (event_sender, event_receiver) = channel();
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = stop_signal.clone();

        let thread = thread::Builder::new()
            .name("input-capture".to_string())
            .spawn(move || capture_loop(raw, event_sender, clock, stop_signal_clone))
            .map_err(|e| Error::Capture(format!("failed to spawn capture thread: {}", e)))?;

        info!("Input capture started.");
        Ok((
            Self {
                thread: Some(thread),
                stop_signal,
            },
            event_receiver,
        ))
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_signal.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Input capture thread panicked.");
            } else {
                info!("Input capture stopped.");
            }
        }
    }
}

impl Drop for InputCapture {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn capture_loop(
    raw: Receiver<RawKeyTransition>,
    events: Sender<InputEvent>,
    clock: Arc<Clock>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        match raw.recv_timeout(CAPTURE_POLL_INTERVAL) {
            Ok(transition) => {
                let event = InputEvent {
                    key: transition.key,
                    transition: transition.transition,
                    timestamp: clock.ms_at(transition.at),
                };
                if events.send(event).is_err() {
                    // Session side hung up.
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Input capture thread exiting.");
}

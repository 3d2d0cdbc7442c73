pub mod app;
pub mod config;
pub mod core;
pub mod error;
pub mod game;
pub mod utils;

pub use app::{FrameObserver, FrameView, SessionControl, SessionReport, run_session};
pub use error::{ChartError, Error, Result};
pub use game::chart::Chart;
pub use game::gameplay::{Outcome, Session, SessionConfig};

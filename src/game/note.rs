use crate::core::input::Lane;
use serde::Serialize;

/// Index of a note inside its chart. Stable for the whole session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NoteId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum NoteKind {
    Tap { time: i64 },
    /// `end_time > time` is guaranteed by [`Note::hold`].
    Hold { time: i64, end_time: i64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Note {
    lane: Lane,
    kind: NoteKind,
}

impl Note {
    pub fn tap(lane: Lane, time: i64) -> Self {
        Self {
            lane,
            kind: NoteKind::Tap { time },
        }
    }

    /// Returns `None` unless `end_time` is strictly after `time`.
    pub fn hold(lane: Lane, time: i64, end_time: i64) -> Option<Self> {
        (end_time > time).then_some(Self {
            lane,
            kind: NoteKind::Hold { time, end_time },
        })
    }

    #[inline(always)]
    pub fn lane(&self) -> Lane {
        self.lane
    }

    #[inline(always)]
    pub fn kind(&self) -> NoteKind {
        self.kind
    }

    /// Press target for both kinds.
    #[inline(always)]
    pub fn time(&self) -> i64 {
        match self.kind {
            NoteKind::Tap { time } | NoteKind::Hold { time, .. } => time,
        }
    }

    #[inline(always)]
    pub fn end_time(&self) -> Option<i64> {
        match self.kind {
            NoteKind::Tap { .. } => None,
            NoteKind::Hold { end_time, .. } => Some(end_time),
        }
    }

    #[inline(always)]
    pub fn is_hold(&self) -> bool {
        matches!(self.kind, NoteKind::Hold { .. })
    }
}

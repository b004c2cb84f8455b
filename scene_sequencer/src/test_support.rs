//! Scripted tracking source for unit tests.

use std::collections::{HashSet, VecDeque};

use signal_gate::Score;

use crate::gesture::GestureMode;
use crate::tracking::{TrackingError, TrackingSource};

/// Plays back a queue of scores, one per `score()` call, regardless of
/// mode.  An exhausted queue reads as 0.0 (no subject).
#[derive(Debug, Default)]
pub struct ScriptedTracker {
    pub scores:         VecDeque<Score>,
    pub ready:          bool,
    pub refuse_start:   bool,
    pub start_requests: usize,
    pub score_calls:    usize,
    /// 0-based `score()` call numbers that fail without consuming a score.
    pub failures:       HashSet<usize>,
}

impl ScriptedTracker {
    pub fn with_scores(scores: &[Score]) -> Self {
        ScriptedTracker {
            scores: scores.iter().copied().collect(),
            ready:  true,
            ..Default::default()
        }
    }

    pub fn not_ready() -> Self {
        ScriptedTracker::default()
    }

    pub fn push(&mut self, scores: &[Score]) {
        self.scores.extend(scores.iter().copied());
    }

    pub fn fail_at(&mut self, call: usize) {
        self.failures.insert(call);
    }
}

impl TrackingSource for ScriptedTracker {
    fn request_start(&mut self) -> Result<(), TrackingError> {
        self.start_requests += 1;
        if self.refuse_start {
            return Err(TrackingError::Unavailable("camera permission denied".into()));
        }
        Ok(())
    }

    fn is_ready(&self) -> bool { self.ready }

    fn score(&mut self, _mode: GestureMode) -> Result<Score, TrackingError> {
        let call = self.score_calls;
        self.score_calls += 1;
        if self.failures.contains(&call) {
            return Err(TrackingError::Sampling("model threw".into()));
        }
        Ok(self.scores.pop_front().unwrap_or(0.0))
    }
}

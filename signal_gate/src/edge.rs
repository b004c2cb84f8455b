//! Rising-edge detection over a continuous score.
//!
//! A gesture "happens" when the score goes from at-or-below the threshold
//! to strictly above it.  Holding the gesture does not re-fire; the score
//! has to dip back to the threshold or below first.

use std::time::Duration;

use tracing::{debug, trace};

use crate::{Score, Threshold};

/// One upward threshold crossing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeEvent {
    /// Session time of the crossing sample.
    pub at:        Duration,
    pub score:     Score,
    pub threshold: Threshold,
}

/// Stateful crossing detector.
///
/// `previous` is `None` until the first sample arrives, so a stream that
/// *starts* above the threshold does not fire until it has dipped once.
#[derive(Clone, Debug, Default)]
pub struct EdgeDetector {
    cooldown:       Option<Duration>,
    previous:       Option<Score>,
    last_fired_at:  Option<Duration>,
    fired:          u32,
    suppressed:     u32,
}

impl EdgeDetector {
    /// `cooldown` is the minimum time between two fired events.  A crossing at
    /// or inside the window is swallowed.
    pub fn new(cooldown: Option<Duration>) -> Self {
        EdgeDetector { cooldown, ..Default::default() }
    }

    /// Feed one sample; returns an event on a (non-suppressed) crossing.
    pub fn update(&mut self, score: Score, threshold: Threshold, now: Duration) -> Option<EdgeEvent> {
        let crossed = matches!(self.previous, Some(prev) if prev <= threshold)
            && score > threshold;
        self.previous = Some(score);

        if !crossed {
            return None;
        }

        if let (Some(cooldown), Some(last)) = (self.cooldown, self.last_fired_at) {
            if now.saturating_sub(last) <= cooldown {
                self.suppressed += 1;
                debug!(?now, ?last, ?cooldown, "crossing suppressed by cooldown");
                return None;
            }
        }

        self.last_fired_at = Some(now);
        self.fired += 1;
        trace!(score, threshold, ?now, "edge fired");
        Some(EdgeEvent { at: now, score, threshold })
    }

    /// Forget all history; the next sample is treated as the first one.
    pub fn reset(&mut self) {
        *self = EdgeDetector::new(self.cooldown);
    }

    pub fn last_score(&self)     -> Option<Score>    { self.previous }
    pub fn last_fired_at(&self)  -> Option<Duration> { self.last_fired_at }
    pub fn fired_count(&self)    -> u32              { self.fired }
    pub fn suppressed_count(&self) -> u32            { self.suppressed }
    pub fn cooldown(&self)       -> Option<Duration> { self.cooldown }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! The tracking collaborator as seen from the core.
//!
//! Camera capture and landmark inference live outside this crate.  The
//! core only needs three things each frame: ask for tracking to start
//! (fire and forget), poll whether it is ready, and read a score for the
//! gesture mode it is waiting on.

use std::collections::HashMap;

use signal_gate::Score;
use thiserror::Error;
use tracing::debug;

use crate::gesture::GestureMode;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum TrackingError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("sampling failed: {0}")]
    Sampling(String),
}

// ════════════════════════════════════════════════════════════════════════════
// TrackingSource trait
// ════════════════════════════════════════════════════════════════════════════

/// Anything the sequencer can pull per-frame gesture scores from.
pub trait TrackingSource {
    /// Ask the backend to begin producing frames.  Must be idempotent and
    /// must not block.
    fn request_start(&mut self) -> Result<(), TrackingError>;

    fn is_ready(&self) -> bool;

    /// Current confidence for `mode`.  Returns `Ok(0.0)`, not an error,
    /// when no subject is in view.
    fn score(&mut self, mode: GestureMode) -> Result<Score, TrackingError>;
}

// ════════════════════════════════════════════════════════════════════════════
// Frame data
// ════════════════════════════════════════════════════════════════════════════

/// A normalised landmark point (x, y in image units 0–1, z relative depth).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx*dx + dy*dy + dz*dz).sqrt()
    }
}

/// Everything the landmark model delivered for one frame.
#[derive(Clone, Debug, Default)]
pub struct TrackingFrame {
    pub face:        Vec<Landmark>,
    pub hand:        Vec<Landmark>,
    /// Named expression coefficients in `[0, 1]`.
    pub blendshapes: HashMap<String, f32>,
}

impl TrackingFrame {
    pub fn has_face(&self) -> bool {
        !self.face.is_empty() || !self.blendshapes.is_empty()
    }

    pub fn blendshape(&self, name: &str) -> f32 {
        self.blendshapes.get(name).copied().unwrap_or(0.0)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FrameTracker — callback-fed reference implementation
// ════════════════════════════════════════════════════════════════════════════

/// Holds the latest frame pushed by the host's inference callback.
///
/// The host calls [`push_frame`](Self::push_frame) whenever the model
/// produces output and [`mark_ready`](Self::mark_ready) once the camera is
/// running; the sequencer reads from it on its own tick.
#[derive(Debug, Default)]
pub struct FrameTracker {
    start_requested: bool,
    ready:           bool,
    latest:          Option<TrackingFrame>,
}

impl FrameTracker {
    pub fn new() -> Self { Self::default() }

    pub fn start_requested(&self) -> bool { self.start_requested }

    pub fn mark_ready(&mut self) { self.ready = true; }

    pub fn push_frame(&mut self, frame: TrackingFrame) {
        self.latest = Some(frame);
    }

    /// Subject left the view.
    pub fn clear_subject(&mut self) {
        self.latest = None;
    }

    pub fn latest(&self) -> Option<&TrackingFrame> { self.latest.as_ref() }
}

impl TrackingSource for FrameTracker {
    fn request_start(&mut self) -> Result<(), TrackingError> {
        if !self.start_requested {
            debug!("tracking start requested");
            self.start_requested = true;
        }
        Ok(())
    }

    fn is_ready(&self) -> bool { self.ready }

    fn score(&mut self, mode: GestureMode) -> Result<Score, TrackingError> {
        Ok(self.latest.as_ref().map(|f| mode.score(f)).unwrap_or(0.0))
    }
}

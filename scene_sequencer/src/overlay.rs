//! Cue-frame overlay animation.
//!
//! A step may carry a short loop of cue images (e.g. a cartoon mouth going
//! from neutral to grin).  Which frame shows is a pure function of session
//! time, so the animation needs no per-frame state and restarts cleanly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One layer to draw: an index into the animator's frames and an opacity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameLayer {
    pub index:   usize,
    pub opacity: f32,
}

/// What to draw this frame: one layer, or two when crossfading.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSelection {
    pub layers: Vec<FrameLayer>,
}

/// Overlay settings as they appear in a deck.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Asset keys, drawn in order.
    pub frames:        Vec<String>,
    #[serde(default = "default_frame_hold_ms")]
    pub frame_hold_ms: u64,
    #[serde(default)]
    pub crossfade:     bool,
}

fn default_frame_hold_ms() -> u64 { 400 }

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayAnimator {
    frames:     Vec<String>,
    frame_hold: Duration,
    crossfade:  bool,
}

impl OverlayAnimator {
    pub fn new(frames: Vec<String>, frame_hold: Duration, crossfade: bool) -> Self {
        // A zero hold would divide by zero below.
        let frame_hold = frame_hold.max(Duration::from_millis(1));
        OverlayAnimator { frames, frame_hold, crossfade }
    }

    pub fn from_config(cfg: &OverlayConfig) -> Self {
        Self::new(cfg.frames.clone(), Duration::from_millis(cfg.frame_hold_ms), cfg.crossfade)
    }

    /// Frames to draw at `now`, or `None` when hidden / empty.
    pub fn select(&self, now: Duration, visible: bool) -> Option<FrameSelection> {
        if !visible || self.frames.is_empty() {
            return None;
        }

        let hold  = self.frame_hold.as_millis();
        let t     = now.as_millis();
        let len   = self.frames.len();
        let index = ((t / hold) % len as u128) as usize;

        if !self.crossfade {
            return Some(FrameSelection {
                layers: vec![FrameLayer { index, opacity: 1.0 }],
            });
        }

        let progress = (t % hold) as f32 / hold as f32;
        Some(FrameSelection {
            layers: vec![
                FrameLayer { index,                   opacity: 1.0 - progress },
                FrameLayer { index: (index + 1) % len, opacity: progress       },
            ],
        })
    }

    pub fn frame(&self, index: usize) -> Option<&str> {
        self.frames.get(index).map(String::as_str)
    }

    pub fn frames(&self)     -> &[String]  { &self.frames }
    pub fn frame_hold(&self) -> Duration   { self.frame_hold }
    pub fn crossfade(&self)  -> bool       { self.crossfade }
    pub fn is_empty(&self)   -> bool       { self.frames.is_empty() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

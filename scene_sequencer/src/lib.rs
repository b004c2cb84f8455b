//! # scene_sequencer
//!
//! Gesture-gated scene sequencing: an ordered deck of scenes, each an
//! ordered run of interaction steps ("smile", "raise your eyebrows", …),
//! each step gated on a per-user calibrated gesture score.
//!
//! ```text
//! tracking backend ──score──▶ InteractionStep ──complete──▶ SceneSequencer
//!                              (calibrator + edge)            │
//!                                                             ├─▶ prompt text
//!                                                             ├─▶ overlay frames
//!                                                             └─▶ cue events
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use scene_sequencer::{FrameTracker, SceneSequencer, SequenceConfig};
//!
//! let mut tracker = FrameTracker::new();
//! let mut seq = SceneSequencer::new(SequenceConfig::suitscapes());
//!
//! let events = seq.tick(Duration::ZERO, &mut tracker);
//! assert!(events.is_empty());
//! assert_eq!(seq.prompt_text(Duration::ZERO), "Starting camera…");
//! assert!(tracker.start_requested());
//! ```

pub mod config;
pub mod error;
pub mod gesture;
pub mod overlay;
pub mod scene;
pub mod step;
pub mod tracking;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{SceneConfig, SequenceConfig, StepConfig, Suit, ThresholdPolicy};
pub use error::{ConfigError, SequenceError};
pub use gesture::GestureMode;
pub use overlay::{FrameLayer, FrameSelection, OverlayAnimator, OverlayConfig};
pub use scene::{Scene, SceneSequencer, SequencerEvent, SequencerPhase};
pub use step::{InteractionStep, StepHooks, StepPhase, StepUpdate};
pub use tracking::{FrameTracker, Landmark, TrackingError, TrackingFrame, TrackingSource};

pub use signal_gate::{CalibrationConfig, Score, Threshold};

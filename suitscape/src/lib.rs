//! # suitscape
//!
//! Interactive sketch for the suit scenes: a window, a tracking backend and
//! a MIDI cue player wrapped around the [`scene_sequencer`] engine.
//!
//! ## Scene flow
//!
//! | Scene | Gesture | Threshold |
//! |---|---|---|
//! | Hearts | Smile | calibrated |
//! | Diamonds | Brow raise, then smile | calibrated |
//! | Clubs | Jaw open | calibrated |
//! | Spades | Pinch, then eyes closed | static 0.6 for pinch |
//!
//! Every confirmed gesture beeps (pitch depends on the gesture), kicks the
//! suit carousel and flashes the window border.  A custom deck can be loaded
//! from JSON with `--config`.
//!
//! ## Feature flags
//!
//! * (default) — **Simulation mode**: held keys stand in for expressions.
//! * `leap` — **Hardware mode**: pinch scores from a LeapMotion controller.
//!
//! ### Simulation keyboard shortcuts
//!
//! | Key | Gesture |
//! |---|---|
//! | `S` / hold | Smile |
//! | `J` / hold | Jaw open |
//! | `B` / hold | Brow raise |
//! | `E` / hold | Eyes closed |
//! | `P` / hold | Pinch |
//! | `G` | Fail the next score sample |
//! | `Q` / `Escape` | Quit |

pub mod app;
pub mod carousel;
pub mod gesture;
pub mod player;
pub mod visualizer;

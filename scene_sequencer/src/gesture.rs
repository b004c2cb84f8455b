//! Gesture modes — what an interaction step listens for, and how a score
//! is read out of a tracking frame.
//!
//! | Mode | Source | Score |
//! |---|---|---|
//! | `smile`       | face blendshapes | mean of `mouthSmileLeft`, `mouthSmileRight` |
//! | `jaw_open`    | face blendshapes | `jawOpen` |
//! | `brow_raise`  | face blendshapes | mean of `browInnerUp`, `browOuterUpLeft`, `browOuterUpRight` |
//! | `eyes_closed` | face blendshapes | mean of `eyeBlinkLeft`, `eyeBlinkRight` |
//! | `pinch`       | hand landmarks   | `1 − dist(thumb tip, index tip) / PINCH_RANGE` |

use std::fmt;

use serde::{Deserialize, Serialize};
use signal_gate::Score;

use crate::tracking::TrackingFrame;

/// Thumb-to-index distance (normalised image units) at which a pinch
/// reads as 0.  Touching fingertips read as 1.
pub const PINCH_RANGE: f32 = 0.15;

/// Hand landmark indices (MediaPipe 21-point hand model).
const THUMB_TIP: usize = 4;
const INDEX_TIP: usize = 8;
const HAND_POINTS: usize = 21;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureMode {
    Smile,
    JawOpen,
    BrowRaise,
    EyesClosed,
    Pinch,
}

impl GestureMode {
    pub const ALL: [GestureMode; 5] = [
        GestureMode::Smile,
        GestureMode::JawOpen,
        GestureMode::BrowRaise,
        GestureMode::EyesClosed,
        GestureMode::Pinch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GestureMode::Smile      => "smile",
            GestureMode::JawOpen    => "open mouth",
            GestureMode::BrowRaise  => "raised eyebrows",
            GestureMode::EyesClosed => "closed eyes",
            GestureMode::Pinch      => "pinch",
        }
    }

    /// Blendshape names averaged for face modes; empty for hand modes.
    pub fn blendshapes(self) -> &'static [&'static str] {
        match self {
            GestureMode::Smile      => &["mouthSmileLeft", "mouthSmileRight"],
            GestureMode::JawOpen    => &["jawOpen"],
            GestureMode::BrowRaise  => &["browInnerUp", "browOuterUpLeft", "browOuterUpRight"],
            GestureMode::EyesClosed => &["eyeBlinkLeft", "eyeBlinkRight"],
            GestureMode::Pinch      => &[],
        }
    }

    pub fn uses_hands(self) -> bool {
        matches!(self, GestureMode::Pinch)
    }

    /// Instruction shown while the score is below the threshold.
    pub fn instruction(self) -> &'static str {
        match self {
            GestureMode::Smile      => "Give us your best smile!",
            GestureMode::JawOpen    => "Open your mouth wide!",
            GestureMode::BrowRaise  => "Raise your eyebrows!",
            GestureMode::EyesClosed => "Close your eyes for a moment…",
            GestureMode::Pinch      => "Pinch thumb and index finger together!",
        }
    }

    /// Shown while the score is above the threshold but nothing has fired.
    pub fn affirmation(self) -> &'static str {
        match self {
            GestureMode::Smile      => "That's it — keep smiling!",
            GestureMode::JawOpen    => "Wider…",
            GestureMode::BrowRaise  => "Nearly there — hold it!",
            GestureMode::EyesClosed => "Good, keep them closed…",
            GestureMode::Pinch      => "Got your fingers — hold the pinch!",
        }
    }

    /// Score for this mode in one frame.  Absent data scores 0.
    pub fn score(self, frame: &TrackingFrame) -> Score {
        if self.uses_hands() {
            return pinch_score(frame);
        }
        let names = self.blendshapes();
        if names.is_empty() || !frame.has_face() {
            return 0.0;
        }
        let sum: f32 = names.iter().map(|n| frame.blendshape(n)).sum();
        (sum / names.len() as f32).clamp(0.0, 1.0)
    }
}

impl fmt::Display for GestureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn pinch_score(frame: &TrackingFrame) -> Score {
    if frame.hand.len() < HAND_POINTS {
        return 0.0;
    }
    let d = frame.hand[THUMB_TIP].distance(&frame.hand[INDEX_TIP]);
    (1.0 - d / PINCH_RANGE).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::Landmark;

    fn face(pairs: &[(&str, f32)]) -> TrackingFrame {
        let mut f = TrackingFrame::default();
        for (k, v) in pairs { f.blendshapes.insert(k.to_string(), *v); }
        f
    }

    fn hand_with_tips(thumb: (f32, f32), index: (f32, f32)) -> TrackingFrame {
        let mut hand = vec![Landmark::default(); HAND_POINTS];
        hand[THUMB_TIP] = Landmark { x: thumb.0, y: thumb.1, z: 0.0 };
        hand[INDEX_TIP] = Landmark { x: index.0, y: index.1, z: 0.0 };
        TrackingFrame { hand, ..Default::default() }
    }

    #[test]
    fn smile_averages_both_sides() {
        let f = face(&[("mouthSmileLeft", 0.6), ("mouthSmileRight", 0.2)]);
        assert!((GestureMode::Smile.score(&f) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn missing_blendshapes_count_as_zero() {
        let f = face(&[("browInnerUp", 0.9)]);
        assert!((GestureMode::BrowRaise.score(&f) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn no_subject_scores_zero() {
        let f = TrackingFrame::default();
        for mode in GestureMode::ALL {
            assert_eq!(mode.score(&f), 0.0, "{}", mode);
        }
    }

    #[test]
    fn pinch_touching_tips_is_full_score() {
        let f = hand_with_tips((0.5, 0.5), (0.5, 0.5));
        assert_eq!(GestureMode::Pinch.score(&f), 1.0);
    }

    #[test]
    fn pinch_far_apart_is_zero() {
        let f = hand_with_tips((0.2, 0.5), (0.6, 0.5));
        assert_eq!(GestureMode::Pinch.score(&f), 0.0);
    }

    #[test]
    fn pinch_halfway() {
        let f = hand_with_tips((0.5, 0.5), (0.5 + PINCH_RANGE / 2.0, 0.5));
        assert!((GestureMode::Pinch.score(&f) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn modes_round_trip_through_snake_case() {
        let json = serde_json::to_string(&GestureMode::BrowRaise).unwrap();
        assert_eq!(json, "\"brow_raise\"");
    }
}

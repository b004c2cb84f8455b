//! Deck configuration — the static description of scenes and steps.
//!
//! Decks are JSON.  Every field except `scenes`, scene `name` and step
//! `mode` has a default, so a minimal deck is just:
//!
//! ```json
//! { "scenes": [ { "name": "Hearts", "steps": [ { "mode": "smile" } ] } ] }
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use signal_gate::CalibrationConfig;
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::gesture::GestureMode;
use crate::overlay::OverlayConfig;

// ════════════════════════════════════════════════════════════════════════════
// Suits
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    pub fn symbol(self) -> char {
        match self {
            Suit::Hearts   => '♥',
            Suit::Diamonds => '♦',
            Suit::Clubs    => '♣',
            Suit::Spades   => '♠',
        }
    }

    pub fn is_red(self) -> bool {
        matches!(self, Suit::Hearts | Suit::Diamonds)
    }

    pub fn index(self) -> usize {
        match self {
            Suit::Hearts   => 0,
            Suit::Diamonds => 1,
            Suit::Clubs    => 2,
            Suit::Spades   => 3,
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Suit::Hearts   => "Hearts",
            Suit::Diamonds => "Diamonds",
            Suit::Clubs    => "Clubs",
            Suit::Spades   => "Spades",
        };
        f.write_str(name)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Step / scene / sequence
// ════════════════════════════════════════════════════════════════════════════

/// Where a step's detection threshold comes from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Learn it from the user's neutral baseline.
    Calibrated(CalibrationConfig),
    /// Fixed value; no calibration phase.
    Static { value: f32 },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::Calibrated(CalibrationConfig::default())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub mode:             GestureMode,
    #[serde(default)]
    pub threshold:        ThresholdPolicy,
    /// Minimum time between two detections.
    #[serde(default)]
    pub cooldown_ms:      Option<u64>,
    /// How long "Success!" stays up.
    #[serde(default = "default_feedback_ms")]
    pub feedback_ms:      u64,
    /// Give up waiting for the gesture after this long; absent = wait forever.
    #[serde(default)]
    pub timeout_ms:       Option<u64>,
    #[serde(default = "default_true")]
    pub confirmation_cue: bool,
    #[serde(default)]
    pub overlay:          Option<OverlayConfig>,
}

fn default_feedback_ms() -> u64 { 1200 }
fn default_true() -> bool { true }

impl StepConfig {
    /// A calibrated step with every other option at its default.
    pub fn new(mode: GestureMode) -> Self {
        StepConfig {
            mode,
            threshold:        ThresholdPolicy::default(),
            cooldown_ms:      None,
            feedback_ms:      default_feedback_ms(),
            timeout_ms:       None,
            confirmation_cue: true,
            overlay:          None,
        }
    }

    pub fn static_threshold(mut self, value: f32) -> Self {
        self.threshold = ThresholdPolicy::Static { value };
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn overlay(mut self, frames: &[&str], frame_hold_ms: u64, crossfade: bool) -> Self {
        self.overlay = Some(OverlayConfig {
            frames: frames.iter().map(|s| s.to_string()).collect(),
            frame_hold_ms,
            crossfade,
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    pub name:  String,
    #[serde(default)]
    pub suit:  Option<Suit>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Pause between a completed scene and the next one.
    #[serde(default = "default_pause_ms")]
    pub pause_ms:    u64,
    #[serde(default = "default_finale")]
    pub finale_text: String,
    pub scenes:      Vec<SceneConfig>,
}

fn default_pause_ms() -> u64 { 2000 }
fn default_finale() -> String { "That's the whole deck.\nThanks for playing!".to_string() }

impl SequenceConfig {
    pub fn new(scenes: Vec<SceneConfig>) -> Self {
        SequenceConfig {
            pause_ms:    default_pause_ms(),
            finale_text: default_finale(),
            scenes,
        }
    }

    /// The built-in four-suit deck.
    pub fn suitscapes() -> Self {
        let scene = |suit: Suit, steps: Vec<StepConfig>| SceneConfig {
            name: suit.to_string(),
            suit: Some(suit),
            steps,
        };
        SequenceConfig::new(vec![
            scene(Suit::Hearts, vec![
                StepConfig::new(GestureMode::Smile)
                    .overlay(&["smile_0", "smile_1", "smile_2"], 400, true),
            ]),
            scene(Suit::Diamonds, vec![
                StepConfig::new(GestureMode::BrowRaise)
                    .overlay(&["brow_0", "brow_1"], 500, false),
                StepConfig::new(GestureMode::Smile),
            ]),
            scene(Suit::Clubs, vec![
                StepConfig::new(GestureMode::JawOpen)
                    .overlay(&["jaw_0", "jaw_1", "jaw_2"], 350, true),
            ]),
            scene(Suit::Spades, vec![
                StepConfig::new(GestureMode::Pinch)
                    .static_threshold(0.6)
                    .timeout_ms(20_000)
                    .overlay(&["pinch_0", "pinch_1"], 450, true),
                StepConfig::new(GestureMode::EyesClosed),
            ]),
        ])
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: SequenceConfig = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), bytes = text.len(), "deck loaded");
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with.  Empty scenes and empty
    /// overlays are allowed (they auto-complete / stay hidden) but logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenes.is_empty() {
            warn!("deck has no scenes; the session will finish immediately");
        }
        for scene in &self.scenes {
            if scene.steps.is_empty() {
                warn!(scene = %scene.name, "scene has no steps; it will auto-complete");
            }
            for (i, step) in scene.steps.iter().enumerate() {
                let at = |msg: String| ConfigError::Invalid(
                    format!("scene `{}` step {} ({}): {}", scene.name, i + 1, step.mode, msg)
                );
                match &step.threshold {
                    ThresholdPolicy::Static { value } => {
                        if !(0.0..=1.0).contains(value) {
                            return Err(at(format!("static threshold {} outside [0, 1]", value)));
                        }
                    }
                    ThresholdPolicy::Calibrated(c) => {
                        if c.lower_bound > c.upper_bound {
                            return Err(at(format!(
                                "calibration bounds inverted ({} > {})",
                                c.lower_bound, c.upper_bound
                            )));
                        }
                        if !(0.0..=1.0).contains(&c.lower_bound)
                            || !(0.0..=1.0).contains(&c.upper_bound)
                            || !(0.0..=1.0).contains(&c.fallback_threshold)
                        {
                            return Err(at("calibration bounds must lie in [0, 1]".to_string()));
                        }
                    }
                }
                if let Some(ov) = &step.overlay {
                    if ov.frames.is_empty() {
                        warn!(scene = %scene.name, step = i + 1, "overlay has no frames; it will stay hidden");
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for SequenceConfig {
    fn default() -> Self { Self::suitscapes() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_deck_gets_defaults() {
        let cfg = SequenceConfig::from_json_str(
            r#"{ "scenes": [ { "name": "Hearts", "steps": [ { "mode": "smile" } ] } ] }"#,
        ).unwrap();
        assert_eq!(cfg.pause_ms, 2000);
        let step = &cfg.scenes[0].steps[0];
        assert_eq!(step.mode, GestureMode::Smile);
        assert_eq!(step.feedback_ms, 1200);
        assert!(step.confirmation_cue);
        assert_eq!(step.threshold, ThresholdPolicy::Calibrated(CalibrationConfig::default()));
        assert_eq!(cfg.scenes[0].suit, None);
    }

    #[test]
    fn static_and_partial_calibration_policies() {
        let cfg = SequenceConfig::from_json_str(r#"{
            "pause_ms": 500,
            "scenes": [ { "name": "S", "suit": "spades", "steps": [
                { "mode": "pinch", "threshold": { "kind": "static", "value": 0.6 }, "timeout_ms": 9000 },
                { "mode": "jaw_open", "threshold": { "kind": "calibrated", "offset": 0.25 } }
            ] } ]
        }"#).unwrap();
        let steps = &cfg.scenes[0].steps;
        assert_eq!(steps[0].threshold, ThresholdPolicy::Static { value: 0.6 });
        assert_eq!(steps[0].timeout_ms, Some(9000));
        match &steps[1].threshold {
            ThresholdPolicy::Calibrated(c) => {
                assert_eq!(c.offset, 0.25);
                assert_eq!(c.target_samples, 60);
            }
            other => panic!("unexpected policy {:?}", other),
        }
        assert_eq!(cfg.scenes[0].suit, Some(Suit::Spades));
    }

    #[test]
    fn empty_scene_is_valid() {
        let cfg = SequenceConfig::from_json_str(r#"{ "scenes": [ { "name": "Blank" } ] }"#).unwrap();
        assert!(cfg.scenes[0].steps.is_empty());
    }

    #[test]
    fn out_of_range_static_threshold_rejected() {
        let err = SequenceConfig::from_json_str(r#"{ "scenes": [ { "name": "X", "steps": [
            { "mode": "smile", "threshold": { "kind": "static", "value": 1.5 } } ] } ] }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let err = SequenceConfig::from_json_str(r#"{ "scenes": [ { "name": "X", "steps": [
            { "mode": "smile", "threshold": { "kind": "calibrated", "lower_bound": 0.9, "upper_bound": 0.2 } } ] } ] }"#).unwrap_err();
        assert!(err.to_string().contains("inverted"));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(SequenceConfig::from_json_str("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SequenceConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn builtin_deck_survives_json() {
        let deck = SequenceConfig::suitscapes();
        let text = deck.to_json_pretty().unwrap();
        assert_eq!(SequenceConfig::from_json_str(&text).unwrap(), deck);
        assert_eq!(deck.scenes.len(), 4);
    }
}

//! Per-session threshold calibration.
//!
//! Neutral expressions differ a lot between people: one user's resting face
//! already reads 0.25 "smile", another's reads 0.02.  A fixed global
//! threshold therefore either misses or over-fires.  The calibrator watches
//! the first `target_samples` frames (the user is asked to hold still),
//! keeps a running mean, and places the threshold a fixed offset above it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Score, Threshold};

// ════════════════════════════════════════════════════════════════════════════
// CalibrationConfig
// ════════════════════════════════════════════════════════════════════════════

/// Tuning for one calibration window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Number of neutral samples to average (≈ 1 s at 60 fps).
    pub target_samples:     usize,
    /// Added to the neutral mean to get the threshold.
    pub offset:             f32,
    pub lower_bound:        f32,
    pub upper_bound:        f32,
    /// Substituted when the score source fails during calibration.
    pub fallback_threshold: f32,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            target_samples:     60,
            offset:             0.18,
            lower_bound:        0.3,
            upper_bound:        0.8,
            fallback_threshold: 0.5,
        }
    }
}

impl CalibrationConfig {
    /// `mean + offset`, clamped into `[lower_bound, upper_bound]`.
    ///
    /// Inverted bounds are read in either order; non-finite bounds fall
    /// back to the defaults.
    pub fn threshold_for(&self, mean: f32) -> Threshold {
        let (lo, hi) = self.bounds();
        (mean + self.offset).clamp(lo, hi)
    }

    /// `(lower, upper)` with `lower <= upper`, always finite and in `[0, 1]`.
    pub fn bounds(&self) -> (Threshold, Threshold) {
        let (lo, hi) = if self.lower_bound.is_finite() && self.upper_bound.is_finite() {
            (self.lower_bound.min(self.upper_bound), self.lower_bound.max(self.upper_bound))
        } else {
            let d = CalibrationConfig::default();
            (d.lower_bound, d.upper_bound)
        };
        (lo.clamp(0.0, 1.0), hi.clamp(0.0, 1.0))
    }

    /// Copy with ordered, finite bounds and a usable offset and fallback.
    pub fn normalized(&self) -> Self {
        let d = CalibrationConfig::default();
        let (lower_bound, upper_bound) = self.bounds();
        CalibrationConfig {
            target_samples: self.target_samples,
            offset: if self.offset.is_finite() { self.offset } else { d.offset },
            lower_bound,
            upper_bound,
            fallback_threshold: if self.fallback_threshold.is_finite() {
                self.fallback_threshold.clamp(0.0, 1.0)
            } else {
                d.fallback_threshold
            },
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SignalCalibrator
// ════════════════════════════════════════════════════════════════════════════

/// Incremental mean over a fixed window of samples, frozen once full.
///
/// No sample history is stored.  After the window fills (or after
/// [`disable`](Self::disable)) the calibrator is inert: every further
/// [`observe`](Self::observe) returns the frozen threshold and changes
/// nothing.
#[derive(Clone, Debug)]
pub struct SignalCalibrator {
    config:       CalibrationConfig,
    target:       usize,
    sample_count: usize,
    running_mean: f32,
    frozen:       Option<Threshold>,
    disabled:     bool,
}

impl SignalCalibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        if config.target_samples == 0 {
            warn!("calibration window of 0 samples requested; using 1");
        }
        let normalized = config.normalized();
        if normalized != config {
            warn!(
                lower = config.lower_bound, upper = config.upper_bound,
                offset = config.offset, fallback = config.fallback_threshold,
                "calibration config out of range; normalized"
            );
        }
        let config = normalized;
        let target = config.target_samples.max(1);
        SignalCalibrator {
            config,
            target,
            sample_count: 0,
            running_mean: 0.0,
            frozen:       None,
            disabled:     false,
        }
    }

    /// Feed one sample.  Returns `None` while the window is still filling,
    /// the finalized threshold on the completing sample and on every call
    /// after it.
    pub fn observe(&mut self, score: Score) -> Option<Threshold> {
        if let Some(t) = self.frozen {
            return Some(t);
        }

        let n = self.sample_count as f32;
        self.running_mean = (self.running_mean * n + score) / (n + 1.0);
        self.sample_count += 1;

        if self.sample_count < self.target {
            return None;
        }

        let threshold = self.config.threshold_for(self.running_mean);
        info!(
            samples   = self.sample_count,
            mean      = self.running_mean,
            threshold,
            "calibration complete"
        );
        self.frozen = Some(threshold);
        Some(threshold)
    }

    /// Abandon adaptive calibration and freeze at the fallback threshold.
    ///
    /// Has no effect once a threshold is already frozen.
    pub fn disable(&mut self) -> Threshold {
        if let Some(t) = self.frozen {
            return t;
        }
        let t = self.config.fallback_threshold;
        debug!(after_samples = self.sample_count, fallback = t, "calibration disabled");
        self.disabled = true;
        self.frozen   = Some(t);
        t
    }

    pub fn threshold(&self)    -> Option<Threshold> { self.frozen }
    pub fn is_frozen(&self)    -> bool              { self.frozen.is_some() }
    pub fn is_disabled(&self)  -> bool              { self.disabled }
    pub fn sample_count(&self) -> usize             { self.sample_count }
    pub fn target(&self)       -> usize             { self.target }
    pub fn running_mean(&self) -> f32               { self.running_mean }
    pub fn config(&self)       -> &CalibrationConfig { &self.config }

    /// Fraction of the window filled, 0.0–1.0.
    pub fn progress(&self) -> f32 {
        if self.frozen.is_some() {
            return 1.0;
        }
        self.sample_count as f32 / self.target as f32
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

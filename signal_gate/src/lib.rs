//! # signal_gate
//!
//! Turns a noisy, per-frame gesture confidence stream into discrete
//! "the user did it" events.
//!
//! * [`SignalCalibrator`] — learns a per-session neutral baseline from the
//!   first N samples and derives a personalised detection threshold.
//! * [`EdgeDetector`] — fires exactly once per upward threshold crossing,
//!   with an optional cooldown.
//!
//! ## Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use signal_gate::{CalibrationConfig, EdgeDetector, SignalCalibrator};
//!
//! let mut cal = SignalCalibrator::new(CalibrationConfig::default());
//! let mut threshold = None;
//! for _ in 0..60 {
//!     threshold = cal.observe(0.1);
//! }
//! let threshold = threshold.unwrap();
//! assert!((threshold - 0.3).abs() < 1e-6);
//!
//! let mut edge = EdgeDetector::new(None);
//! assert!(edge.update(0.1, threshold, Duration::ZERO).is_none());
//! assert!(edge.update(0.5, threshold, Duration::from_millis(16)).is_some());
//! ```

pub mod calibrator;
pub mod edge;
pub mod trace;

pub use calibrator::{CalibrationConfig, SignalCalibrator};
pub use edge::{EdgeDetector, EdgeEvent};
pub use trace::{parse_trace, replay, ReplayReport, ReplayThreshold, TraceError, TraceSample};

/// Confidence that a gesture is happening, in `[0, 1]`.
pub type Score = f32;

/// Detection threshold, in `[0, 1]`.
pub type Threshold = f32;

/// Validate a raw score from a tracking backend.
///
/// Returns `None` for NaN / infinite values (a sampling failure), otherwise
/// the value clamped into `[0, 1]`.
pub fn sanitize_score(raw: f32) -> Option<Score> {
    if raw.is_finite() {
        Some(raw.clamp(0.0, 1.0))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_finite_values() {
        assert_eq!(sanitize_score(-0.2), Some(0.0));
        assert_eq!(sanitize_score(1.7), Some(1.0));
        assert_eq!(sanitize_score(0.25), Some(0.25));
    }

    #[test]
    fn sanitize_rejects_non_finite() {
        assert_eq!(sanitize_score(f32::NAN), None);
        assert_eq!(sanitize_score(f32::INFINITY), None);
    }
}

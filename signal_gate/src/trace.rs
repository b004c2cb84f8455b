//! Offline replay of recorded score traces.
//!
//! A trace is plain text, one sample per line:
//!
//! ```text
//! # t_ms,score
//! 0,0.08
//! 16,0.11
//! 33,0.64
//! ```
//!
//! A bare `score` per line is also accepted; those samples are spaced by
//! the frame interval given to [`parse_trace`].  Blank lines and `#`
//! comments are skipped.

use std::time::Duration;

use thiserror::Error;

use crate::{sanitize_score, CalibrationConfig, EdgeDetector, EdgeEvent, Score, SignalCalibrator, Threshold};

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: cannot parse `{text}` as a number")]
    BadNumber { line: usize, text: String },
    #[error("line {line}: score is not finite")]
    NonFinite { line: usize },
    #[error("line {line}: timestamp {t_ms} ms goes backwards")]
    NonMonotonic { line: usize, t_ms: u64 },
    #[error("trace contains no samples")]
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceSample {
    pub at:    Duration,
    pub score: Score,
}

/// Parse a trace; bare-score lines advance time by `frame_interval`.
pub fn parse_trace(text: &str, frame_interval: Duration) -> Result<Vec<TraceSample>, TraceError> {
    let mut out: Vec<TraceSample> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let body = raw.split('#').next().unwrap_or("").trim();
        if body.is_empty() { continue; }

        let (at, score_text) = match body.split_once(',') {
            Some((t, s)) => {
                let t_ms: u64 = t.trim().parse().map_err(|_| TraceError::BadNumber {
                    line, text: t.trim().to_string(),
                })?;
                (Duration::from_millis(t_ms), s.trim())
            }
            None => {
                let at = out.last()
                    .map(|prev| prev.at + frame_interval)
                    .unwrap_or(Duration::ZERO);
                (at, body)
            }
        };

        if let Some(prev) = out.last() {
            if at < prev.at {
                return Err(TraceError::NonMonotonic { line, t_ms: at.as_millis() as u64 });
            }
        }

        let raw_score: f32 = score_text.parse().map_err(|_| TraceError::BadNumber {
            line, text: score_text.to_string(),
        })?;
        let score = sanitize_score(raw_score).ok_or(TraceError::NonFinite { line })?;
        out.push(TraceSample { at, score });
    }

    if out.is_empty() {
        return Err(TraceError::Empty);
    }
    Ok(out)
}

// ════════════════════════════════════════════════════════════════════════════
// Replay
// ════════════════════════════════════════════════════════════════════════════

/// How the replay obtains its threshold.
#[derive(Clone, Debug)]
pub enum ReplayThreshold {
    /// Calibrate on the leading samples, then detect on the rest.
    Calibrated(CalibrationConfig),
    /// Detect from the first sample with a fixed threshold.
    Static(Threshold),
}

#[derive(Clone, Debug, Default)]
pub struct ReplayReport {
    pub samples:         usize,
    pub threshold:       Option<Threshold>,
    /// 0-based sample index that completed calibration.
    pub calibrated_at:   Option<usize>,
    pub edges:           Vec<EdgeEvent>,
    pub suppressed:      u32,
}

/// Run calibration + edge detection over a whole trace.
pub fn replay(samples: &[TraceSample], mode: &ReplayThreshold, cooldown: Option<Duration>) -> ReplayReport {
    let mut report = ReplayReport { samples: samples.len(), ..Default::default() };
    let mut edge   = EdgeDetector::new(cooldown);

    let (mut calibrator, mut threshold) = match mode {
        ReplayThreshold::Calibrated(cfg) => (Some(SignalCalibrator::new(cfg.clone())), None),
        ReplayThreshold::Static(t)       => (None, Some(*t)),
    };

    for (i, s) in samples.iter().enumerate() {
        match threshold {
            Some(t) => {
                if let Some(ev) = edge.update(s.score, t, s.at) {
                    report.edges.push(ev);
                }
            }
            None => {
                if let Some(cal) = calibrator.as_mut() {
                    if let Some(t) = cal.observe(s.score) {
                        threshold = Some(t);
                        report.calibrated_at = Some(i);
                    }
                }
            }
        }
    }

    report.threshold  = threshold;
    report.suppressed = edge.suppressed_count();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn parses_timed_and_bare_lines() {
        let text = "# header\n0,0.1\n\n20, 0.4 # comment\n0.9\n";
        let samples = parse_trace(text, FRAME).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].at, Duration::from_millis(20));
        assert_eq!(samples[2].at, Duration::from_millis(36));
        assert_eq!(samples[2].score, 0.9);
    }

    #[test]
    fn rejects_garbage_with_line_number() {
        let err = parse_trace("0.1\nabc\n", FRAME).unwrap_err();
        assert!(matches!(err, TraceError::BadNumber { line: 2, .. }));
    }

    #[test]
    fn rejects_time_going_backwards() {
        let err = parse_trace("100,0.1\n50,0.2\n", FRAME).unwrap_err();
        assert!(matches!(err, TraceError::NonMonotonic { line: 2, t_ms: 50 }));
    }

    #[test]
    fn empty_trace_is_an_error() {
        assert!(matches!(parse_trace("# nothing\n", FRAME), Err(TraceError::Empty)));
    }

    #[test]
    fn replay_calibrates_then_detects() {
        let mut text = String::new();
        for _ in 0..60 { text.push_str("0.1\n"); }
        text.push_str("0.1\n0.5\n0.1\n0.5\n");
        let samples = parse_trace(&text, FRAME).unwrap();

        let report = replay(&samples, &ReplayThreshold::Calibrated(CalibrationConfig::default()), None);
        assert_eq!(report.calibrated_at, Some(59));
        assert!((report.threshold.unwrap() - 0.3).abs() < 1e-5);
        assert_eq!(report.edges.len(), 2);
    }

    #[test]
    fn replay_static_threshold_with_cooldown() {
        let samples = parse_trace("0,0.1\n0,0.5\n0,0.1\n0,0.5\n", FRAME).unwrap();
        let report = replay(&samples, &ReplayThreshold::Static(0.3), Some(Duration::from_secs(10)));
        assert_eq!(report.edges.len(), 1);
        assert_eq!(report.suppressed, 1);
    }
}

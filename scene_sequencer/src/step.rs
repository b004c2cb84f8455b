//! Interaction steps — "detect one gesture" units.
//!
//! Each step runs its own little state machine:
//!
//! ```text
//! Starting ──ready──▶ Calibrating ──threshold──▶ AwaitingGesture ──edge──▶ Succeeded
//!     │                                               │
//!     └──ready (static threshold)─────────────────────┘──timeout──▶ Skipped
//! ```
//!
//! A step owns its calibrator and edge detector outright; nothing about a
//! user's baseline leaks between steps.

use std::time::Duration;

use signal_gate::{sanitize_score, EdgeDetector, EdgeEvent, Score, SignalCalibrator, Threshold};
use tracing::{debug, info, warn};

use crate::config::{StepConfig, ThresholdPolicy};
use crate::error::SequenceError;
use crate::gesture::GestureMode;
use crate::overlay::OverlayAnimator;
use crate::tracking::{TrackingError, TrackingSource};

/// Fraction of the threshold a score must reach to count as a near miss.
const NEAR_MISS_RATIO: f32 = 0.75;
/// How long "Try again!" stays up after a near miss.
const NEAR_MISS_HOLD: Duration = Duration::from_millis(1500);

pub const PROMPT_STARTING:    &str = "Starting camera…";
pub const PROMPT_CALIBRATING: &str = "Calibrating — please hold a neutral expression…";
pub const PROMPT_SUCCESS:     &str = "Success!";
pub const PROMPT_DONE:        &str = "Done.";
pub const PROMPT_SKIPPED:     &str = "No worries — moving on.";
pub const PROMPT_TRY_AGAIN:   &str = "Try again!";

// ════════════════════════════════════════════════════════════════════════════
// Phase / outcome
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepPhase {
    Starting,
    Calibrating,
    AwaitingGesture,
    Succeeded,
    /// Gave up after the configured timeout.
    Skipped,
}

impl StepPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepPhase::Succeeded | StepPhase::Skipped)
    }
}

/// What one [`InteractionStep::update`] call did.
#[derive(Clone, Debug, PartialEq)]
pub enum StepUpdate {
    /// Nothing observable changed.
    Idle,
    /// A threshold is now in force.  `adaptive` is false when it came from
    /// a static policy or the calibration fallback.
    Calibrated { threshold: Threshold, adaptive: bool },
    /// The gesture was detected.  `cue` mirrors the step's cue hook.
    Confirmed { event: EdgeEvent, cue: bool },
    TimedOut,
}

// ════════════════════════════════════════════════════════════════════════════
// Hooks — optional capabilities declared at construction
// ════════════════════════════════════════════════════════════════════════════

/// Optional behaviour a step opts into.  Resolved once from config; the
/// sequencer consults these instead of probing the step each frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepHooks {
    /// Request a confirmation cue (beep) on success.
    pub confirmation_cue: bool,
    /// Cue-frame animation shown while the step is active.
    pub overlay:          Option<OverlayAnimator>,
}

// ════════════════════════════════════════════════════════════════════════════
// InteractionStep
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct InteractionStep {
    mode:       GestureMode,
    hooks:      StepHooks,
    phase:      StepPhase,

    // ── threshold ────────────────────────────────────────────────────────
    calibrator: Option<SignalCalibrator>,
    static_threshold: Option<Threshold>,
    threshold:  Option<Threshold>,
    calibration_failed: bool,

    // ── detection ────────────────────────────────────────────────────────
    edge:       EdgeDetector,
    last_score: Score,
    near_miss_until: Option<Duration>,

    // ── timing ───────────────────────────────────────────────────────────
    start_requested: bool,
    started_at:      Option<Duration>,
    awaiting_since:  Option<Duration>,
    feedback:        Duration,
    feedback_until:  Option<Duration>,
    timeout:         Option<Duration>,
}

impl InteractionStep {
    /// Build a fresh step in `Starting` from its deck entry.
    pub fn from_config(cfg: &StepConfig) -> Self {
        let overlay = cfg.overlay.as_ref()
            .map(OverlayAnimator::from_config)
            .filter(|o| !o.is_empty());

        let (calibrator, static_threshold) = match &cfg.threshold {
            ThresholdPolicy::Calibrated(c)   => (Some(SignalCalibrator::new(c.clone())), None),
            ThresholdPolicy::Static { value } => (None, Some(value.clamp(0.0, 1.0))),
        };

        InteractionStep {
            mode:  cfg.mode,
            hooks: StepHooks { confirmation_cue: cfg.confirmation_cue, overlay },
            phase: StepPhase::Starting,
            calibrator,
            static_threshold,
            threshold: None,
            calibration_failed: false,
            edge:       EdgeDetector::new(cfg.cooldown_ms.map(Duration::from_millis)),
            last_score: 0.0,
            near_miss_until: None,
            start_requested: false,
            started_at:      None,
            awaiting_since:  None,
            feedback:        Duration::from_millis(cfg.feedback_ms),
            feedback_until:  None,
            timeout:         cfg.timeout_ms.map(Duration::from_millis),
        }
    }

    /// Advance one frame.
    ///
    /// A score failure while calibrating is absorbed here (calibration is
    /// dropped for this step and the fallback threshold used).  A score
    /// failure while awaiting the gesture is returned so the tick boundary
    /// can report it; the frame's sample is simply lost.
    pub fn update(&mut self, now: Duration, tracker: &mut dyn TrackingSource) -> Result<StepUpdate, SequenceError> {
        match self.phase {
            StepPhase::Succeeded | StepPhase::Skipped => Ok(StepUpdate::Idle),

            StepPhase::Starting => {
                if self.started_at.is_none() {
                    self.started_at = Some(now);
                }
                if !self.start_requested {
                    self.start_requested = true;
                    if let Err(e) = tracker.request_start() {
                        // Not retried: the backend owns its retry policy.
                        let err = SequenceError::TrackingUnavailable(e.to_string());
                        warn!(mode = %self.mode, error = %err, "tracking start request failed");
                    }
                }
                if !tracker.is_ready() {
                    return Ok(StepUpdate::Idle);
                }

                match self.static_threshold {
                    Some(t) => {
                        debug!(mode = %self.mode, threshold = t, "tracking ready, static threshold");
                        self.enter_awaiting(t, now);
                        // This frame's sample primes the edge detector.  A lost
                        // sample only delays priming; the threshold is in force.
                        if let Err(err) = self.await_gesture(now, tracker) {
                            warn!(mode = %self.mode, error = %err, "priming sample lost");
                        }
                        Ok(StepUpdate::Calibrated { threshold: t, adaptive: false })
                    }
                    None => {
                        debug!(mode = %self.mode, "tracking ready, calibrating");
                        self.phase = StepPhase::Calibrating;
                        self.calibrate(now, tracker)
                    }
                }
            }

            StepPhase::Calibrating     => self.calibrate(now, tracker),
            StepPhase::AwaitingGesture => self.await_gesture(now, tracker),
        }
    }

    fn calibrate(&mut self, now: Duration, tracker: &mut dyn TrackingSource) -> Result<StepUpdate, SequenceError> {
        let Some(cal) = self.calibrator.as_mut() else {
            // Static policies never enter Calibrating.
            return Ok(StepUpdate::Idle);
        };

        match read_score(tracker, self.mode) {
            Ok(score) => {
                self.last_score = score;
                match cal.observe(score) {
                    Some(t) => {
                        self.enter_awaiting(t, now);
                        Ok(StepUpdate::Calibrated { threshold: t, adaptive: true })
                    }
                    None => Ok(StepUpdate::Idle),
                }
            }
            Err(err) => {
                let t = cal.disable();
                self.calibration_failed = true;
                warn!(
                    mode = %self.mode, error = %err, fallback = t,
                    "score source failed while calibrating; using static threshold"
                );
                self.enter_awaiting(t, now);
                Ok(StepUpdate::Calibrated { threshold: t, adaptive: false })
            }
        }
    }

    fn enter_awaiting(&mut self, threshold: Threshold, now: Duration) {
        self.threshold      = Some(threshold);
        self.awaiting_since = Some(now);
        self.phase          = StepPhase::AwaitingGesture;
        info!(mode = %self.mode, threshold, "awaiting gesture");
    }

    fn await_gesture(&mut self, now: Duration, tracker: &mut dyn TrackingSource) -> Result<StepUpdate, SequenceError> {
        let Some(threshold) = self.threshold else {
            return Ok(StepUpdate::Idle);
        };

        // Checked before sampling so a failing source cannot hold the step open.
        if let (Some(timeout), Some(since)) = (self.timeout, self.awaiting_since) {
            if now.saturating_sub(since) >= timeout {
                self.phase          = StepPhase::Skipped;
                self.feedback_until = Some(now + self.feedback);
                info!(mode = %self.mode, ?timeout, "gesture timed out; skipping");
                return Ok(StepUpdate::TimedOut);
            }
        }

        let score = read_score(tracker, self.mode)?;
        self.last_score = score;

        if score > threshold * NEAR_MISS_RATIO && score <= threshold {
            self.near_miss_until = Some(now + NEAR_MISS_HOLD);
        }

        if let Some(event) = self.edge.update(score, threshold, now) {
            self.phase          = StepPhase::Succeeded;
            self.feedback_until = Some(now + self.feedback);
            info!(mode = %self.mode, score, threshold, "gesture confirmed");
            return Ok(StepUpdate::Confirmed { event, cue: self.hooks.confirmation_cue });
        }

        Ok(StepUpdate::Idle)
    }

    // ── Render-facing accessors ───────────────────────────────────────────

    /// User guidance for the current state.  May contain `\n`.
    pub fn prompt_text(&self, now: Duration) -> String {
        match self.phase {
            StepPhase::Starting => PROMPT_STARTING.to_string(),
            StepPhase::Calibrating => {
                let pct = self.calibrator.as_ref().map(|c| c.progress()).unwrap_or(0.0) * 100.0;
                format!("{}\n{:.0}%", PROMPT_CALIBRATING, pct)
            }
            StepPhase::AwaitingGesture => {
                let above = self.threshold.map(|t| self.last_score > t).unwrap_or(false);
                if above {
                    self.mode.affirmation().to_string()
                } else if self.near_miss_until.map(|until| now < until).unwrap_or(false) {
                    format!("{}\n{}", self.mode.instruction(), PROMPT_TRY_AGAIN)
                } else {
                    self.mode.instruction().to_string()
                }
            }
            StepPhase::Succeeded => {
                if self.feedback_active(now) { PROMPT_SUCCESS.to_string() } else { PROMPT_DONE.to_string() }
            }
            StepPhase::Skipped => PROMPT_SKIPPED.to_string(),
        }
    }

    /// Still within the post-completion feedback window.
    pub fn feedback_active(&self, now: Duration) -> bool {
        self.feedback_until.map(|until| now < until).unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool { self.phase.is_terminal() }

    /// True while the step is live and has an overlay to show.
    pub fn wants_overlay(&self) -> bool {
        !self.is_complete() && self.hooks.overlay.is_some()
    }

    pub fn mode(&self)       -> GestureMode       { self.mode }
    pub fn phase(&self)      -> StepPhase         { self.phase }
    pub fn hooks(&self)      -> &StepHooks        { &self.hooks }
    pub fn threshold(&self)  -> Option<Threshold> { self.threshold }
    pub fn last_score(&self) -> Score             { self.last_score }
    pub fn started_at(&self) -> Option<Duration>  { self.started_at }
    pub fn completion_feedback_until(&self) -> Option<Duration> { self.feedback_until }
    pub fn calibration_failed(&self) -> bool      { self.calibration_failed }

    /// Calibration progress 0.0–1.0 (1.0 for static thresholds once ready).
    pub fn calibration_progress(&self) -> f32 {
        match (&self.calibrator, self.threshold) {
            (_, Some(_))      => 1.0,
            (Some(c), None)   => c.progress(),
            (None, None)      => 0.0,
        }
    }
}

/// One guarded call into the tracking collaborator.
fn read_score(tracker: &mut dyn TrackingSource, mode: GestureMode) -> Result<Score, SequenceError> {
    let raw = tracker.score(mode).map_err(|e| SequenceError::score_source(mode, e))?;
    sanitize_score(raw).ok_or_else(|| {
        SequenceError::score_source(mode, TrackingError::Sampling(format!("non-finite score {}", raw)))
    })
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTracker;
    use signal_gate::CalibrationConfig;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn calibrated(window: usize) -> StepConfig {
        let mut cfg = StepConfig::new(GestureMode::Smile);
        cfg.threshold = ThresholdPolicy::Calibrated(CalibrationConfig {
            target_samples: window,
            ..Default::default()
        });
        cfg
    }

    /// Feed `scores` one per 16 ms frame starting at `t0`; return last update.
    fn run(step: &mut InteractionStep, tracker: &mut ScriptedTracker, t0: u64, n: usize) -> Vec<StepUpdate> {
        (0..n).map(|i| step.update(ms(t0 + i as u64 * 16), tracker).unwrap()).collect()
    }

    #[test]
    fn stays_starting_until_tracking_ready() {
        let mut step = InteractionStep::from_config(&calibrated(3));
        let mut tracker = ScriptedTracker::not_ready();
        for i in 0..5 {
            assert_eq!(step.update(ms(i * 16), &mut tracker).unwrap(), StepUpdate::Idle);
        }
        assert_eq!(step.phase(), StepPhase::Starting);
        assert_eq!(step.prompt_text(ms(80)), PROMPT_STARTING);
        assert_eq!(tracker.start_requests, 1);
    }

    #[test]
    fn failed_start_request_keeps_starting() {
        let mut step = InteractionStep::from_config(&calibrated(3));
        let mut tracker = ScriptedTracker::not_ready();
        tracker.refuse_start = true;
        step.update(ms(0), &mut tracker).unwrap();
        step.update(ms(16), &mut tracker).unwrap();
        assert_eq!(step.phase(), StepPhase::Starting);
        assert_eq!(tracker.start_requests, 1);
    }

    #[test]
    fn calibrates_then_detects_rising_edge() {
        let mut step = InteractionStep::from_config(&calibrated(60));
        let mut tracker = ScriptedTracker::with_scores(&[0.1; 60]);
        let updates = run(&mut step, &mut tracker, 0, 60);
        assert!(matches!(
            updates.last(),
            Some(StepUpdate::Calibrated { adaptive: true, .. })
        ));
        assert!((step.threshold().unwrap() - 0.3).abs() < 1e-5);
        assert_eq!(step.phase(), StepPhase::AwaitingGesture);

        tracker.push(&[0.1, 0.5]);
        assert_eq!(step.update(ms(1000), &mut tracker).unwrap(), StepUpdate::Idle);
        let fired = step.update(ms(1016), &mut tracker).unwrap();
        assert!(matches!(fired, StepUpdate::Confirmed { cue: true, .. }));
        assert!(step.is_complete());
        assert_eq!(step.completion_feedback_until(), Some(ms(1016 + 1200)));
    }

    #[test]
    fn succeeded_ignores_later_samples() {
        let mut step = InteractionStep::from_config(&StepConfig::new(GestureMode::Smile).static_threshold(0.3));
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.5, 0.1, 0.9]);
        run(&mut step, &mut tracker, 0, 2);
        assert_eq!(step.phase(), StepPhase::Succeeded);
        assert_eq!(run(&mut step, &mut tracker, 100, 2), vec![StepUpdate::Idle, StepUpdate::Idle]);
        assert_eq!(step.last_score(), 0.5);
    }

    #[test]
    fn static_policy_skips_calibration() {
        let mut step = InteractionStep::from_config(&StepConfig::new(GestureMode::Pinch).static_threshold(0.6));
        let mut tracker = ScriptedTracker::with_scores(&[0.0]);
        let u = step.update(ms(0), &mut tracker).unwrap();
        assert_eq!(u, StepUpdate::Calibrated { threshold: 0.6, adaptive: false });
        assert_eq!(step.phase(), StepPhase::AwaitingGesture);
        assert_eq!(step.calibration_progress(), 1.0);
    }

    #[test]
    fn score_failure_while_calibrating_falls_back() {
        let mut step = InteractionStep::from_config(&calibrated(60));
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.1]);
        tracker.fail_at(2);
        run(&mut step, &mut tracker, 0, 2);
        let u = step.update(ms(32), &mut tracker).unwrap();
        assert_eq!(u, StepUpdate::Calibrated { threshold: 0.5, adaptive: false });
        assert!(step.calibration_failed());
        assert_eq!(step.phase(), StepPhase::AwaitingGesture);
    }

    #[test]
    fn score_failure_while_awaiting_is_reported() {
        let mut step = InteractionStep::from_config(&StepConfig::new(GestureMode::Smile).static_threshold(0.3));
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.1, 0.5]);
        tracker.fail_at(1);
        step.update(ms(0), &mut tracker).unwrap();
        let err = step.update(ms(16), &mut tracker).unwrap_err();
        assert!(matches!(err, SequenceError::ScoreSource { mode: GestureMode::Smile, .. }));
        // Still alive; the next good frames complete the step.
        assert_eq!(step.phase(), StepPhase::AwaitingGesture);
        step.update(ms(32), &mut tracker).unwrap();
        assert!(matches!(step.update(ms(48), &mut tracker).unwrap(), StepUpdate::Confirmed { .. }));
    }

    #[test]
    fn non_finite_score_is_a_source_failure() {
        let mut step = InteractionStep::from_config(&StepConfig::new(GestureMode::Smile).static_threshold(0.3));
        let mut tracker = ScriptedTracker::with_scores(&[0.1, f32::NAN]);
        step.update(ms(0), &mut tracker).unwrap();
        assert!(step.update(ms(16), &mut tracker).is_err());
    }

    #[test]
    fn prompt_text_follows_phases() {
        let mut step = InteractionStep::from_config(&calibrated(2));
        let mut tracker = ScriptedTracker::with_scores(&[0.0, 0.0, 0.1, 0.25, 0.1, 0.9, 0.1, 0.9]);

        step.update(ms(0), &mut tracker).unwrap();
        assert!(step.prompt_text(ms(0)).starts_with(PROMPT_CALIBRATING));
        assert!(step.prompt_text(ms(0)).ends_with("50%"));

        step.update(ms(16), &mut tracker).unwrap(); // threshold 0.3
        step.update(ms(32), &mut tracker).unwrap(); // 0.1
        assert_eq!(step.prompt_text(ms(32)), GestureMode::Smile.instruction());

        step.update(ms(48), &mut tracker).unwrap(); // 0.25, a near miss
        step.update(ms(64), &mut tracker).unwrap(); // 0.1
        assert!(step.prompt_text(ms(64)).ends_with(PROMPT_TRY_AGAIN));
        // The hint expires once the user has had time to retry.
        assert_eq!(step.prompt_text(ms(48 + 1500)), GestureMode::Smile.instruction());

        step.update(ms(80), &mut tracker).unwrap(); // 0.9 fires
        assert_eq!(step.prompt_text(ms(80)), PROMPT_SUCCESS);
        assert_eq!(step.prompt_text(ms(80 + 1200)), PROMPT_DONE);
    }

    #[test]
    fn affirmation_while_above_but_suppressed() {
        let mut cfg = StepConfig::new(GestureMode::JawOpen).static_threshold(0.3);
        cfg.feedback_ms = 0;
        let mut step = InteractionStep::from_config(&cfg);
        // First sample above threshold only primes the detector.
        let mut tracker = ScriptedTracker::with_scores(&[0.8]);
        step.update(ms(0), &mut tracker).unwrap();
        assert_eq!(step.phase(), StepPhase::AwaitingGesture);
        assert_eq!(step.prompt_text(ms(0)), GestureMode::JawOpen.affirmation());
    }

    #[test]
    fn timeout_skips_without_cue() {
        let cfg = StepConfig::new(GestureMode::Pinch).static_threshold(0.6).timeout_ms(100);
        let mut step = InteractionStep::from_config(&cfg);
        let mut tracker = ScriptedTracker::with_scores(&[]);
        let updates = run(&mut step, &mut tracker, 0, 8); // 0..112 ms
        assert_eq!(updates.last(), Some(&StepUpdate::TimedOut));
        assert_eq!(step.phase(), StepPhase::Skipped);
        assert!(step.is_complete());
        assert_eq!(step.prompt_text(ms(200)), PROMPT_SKIPPED);
    }

    #[test]
    fn no_cue_hook_means_no_cue() {
        let mut cfg = StepConfig::new(GestureMode::Smile).static_threshold(0.3);
        cfg.confirmation_cue = false;
        let mut step = InteractionStep::from_config(&cfg);
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.9]);
        let updates = run(&mut step, &mut tracker, 0, 2);
        assert!(matches!(updates[1], StepUpdate::Confirmed { cue: false, .. }));
    }

    #[test]
    fn empty_overlay_is_not_a_hook() {
        let cfg = StepConfig::new(GestureMode::Smile).overlay(&[], 100, false);
        let step = InteractionStep::from_config(&cfg);
        assert!(step.hooks().overlay.is_none());
        assert!(!step.wants_overlay());

        let cfg = StepConfig::new(GestureMode::Smile).overlay(&["a"], 100, false);
        assert!(InteractionStep::from_config(&cfg).wants_overlay());
    }

    #[test]
    fn near_miss_hint_is_renewed_by_a_later_miss() {
        let mut step = InteractionStep::from_config(&StepConfig::new(GestureMode::Smile).static_threshold(0.4));
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.35, 0.1, 0.1, 0.35]);
        run(&mut step, &mut tracker, 0, 4);
        assert!(step.prompt_text(ms(100)).ends_with(PROMPT_TRY_AGAIN));
        assert_eq!(step.prompt_text(ms(16 + 1500)), GestureMode::Smile.instruction());

        step.update(ms(2000), &mut tracker).unwrap(); // 0.35 again
        assert!(step.prompt_text(ms(2100)).ends_with(PROMPT_TRY_AGAIN));
    }

    #[test]
    fn failed_priming_sample_still_reports_static_threshold() {
        let mut step = InteractionStep::from_config(&StepConfig::new(GestureMode::Pinch).static_threshold(0.6));
        let mut tracker = ScriptedTracker::with_scores(&[0.0, 0.9]);
        tracker.fail_at(0);
        let u = step.update(ms(0), &mut tracker).unwrap();
        assert_eq!(u, StepUpdate::Calibrated { threshold: 0.6, adaptive: false });
        assert_eq!(step.phase(), StepPhase::AwaitingGesture);
        // The next good sample primes; the one after can fire.
        assert_eq!(step.update(ms(16), &mut tracker).unwrap(), StepUpdate::Idle);
        assert!(matches!(step.update(ms(32), &mut tracker).unwrap(), StepUpdate::Confirmed { .. }));
    }

    #[test]
    fn timeout_fires_even_when_every_sample_fails() {
        let cfg = StepConfig::new(GestureMode::Smile).static_threshold(0.3).timeout_ms(100);
        let mut step = InteractionStep::from_config(&cfg);
        let mut tracker = ScriptedTracker::with_scores(&[]);
        for call in 0..20 { tracker.fail_at(call); }

        step.update(ms(0), &mut tracker).unwrap(); // ready; priming sample lost
        for i in 1..7 {
            assert!(step.update(ms(i * 16), &mut tracker).is_err());
        }
        assert_eq!(step.update(ms(112), &mut tracker).unwrap(), StepUpdate::TimedOut);
        assert_eq!(step.phase(), StepPhase::Skipped);
    }
}

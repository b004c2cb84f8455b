//! Scenes and the sequencer that walks through them.
//!
//! `SceneSequencer` owns every piece of session state.  The host calls
//! [`tick`](SceneSequencer::tick) once per display frame with the session
//! time and the tracking source, then asks for the prompt text and overlay
//! selection to draw.  Nothing here blocks.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{SceneConfig, SequenceConfig, Suit};
use crate::error::SequenceError;
use crate::gesture::GestureMode;
use crate::overlay::FrameSelection;
use crate::step::{InteractionStep, StepPhase, StepUpdate};
use crate::tracking::TrackingSource;

pub const PROMPT_FAULT: &str = "Something went wrong —\nhang on…";

// ════════════════════════════════════════════════════════════════════════════
// Scene
// ════════════════════════════════════════════════════════════════════════════

/// One thematic unit: an ordered run of interaction steps.
#[derive(Clone, Debug)]
pub struct Scene {
    name:       String,
    suit:       Option<Suit>,
    steps:      Vec<InteractionStep>,
    step_index: usize,
}

impl Scene {
    /// Fresh scene with every step in `Starting`.
    pub fn from_config(cfg: &SceneConfig) -> Self {
        Scene {
            name:       cfg.name.clone(),
            suit:       cfg.suit,
            steps:      cfg.steps.iter().map(InteractionStep::from_config).collect(),
            step_index: 0,
        }
    }

    /// All steps done (trivially true with no steps).
    pub fn is_complete(&self) -> bool { self.step_index >= self.steps.len() }

    pub fn current_step(&self) -> Option<&InteractionStep> { self.steps.get(self.step_index) }

    /// The most recently completed step, if any.
    pub fn previous_step(&self) -> Option<&InteractionStep> {
        self.step_index.checked_sub(1).and_then(|i| self.steps.get(i))
    }

    pub fn name(&self)       -> &str                { &self.name }
    pub fn suit(&self)       -> Option<Suit>        { self.suit }
    pub fn steps(&self)      -> &[InteractionStep]  { &self.steps }
    pub fn step_index(&self) -> usize               { self.step_index }
}

// ════════════════════════════════════════════════════════════════════════════
// Events / phase
// ════════════════════════════════════════════════════════════════════════════

/// Things that happened during a tick, for the host to react to.
#[derive(Clone, Debug, PartialEq)]
pub enum SequencerEvent {
    SceneStarted   { scene: usize, name: String },
    Calibrated     { scene: usize, step: usize, threshold: f32, adaptive: bool },
    /// Play the confirmation cue.
    CueRequested   { scene: usize, step: usize, mode: GestureMode },
    StepCompleted  { scene: usize, step: usize, confirmed: bool },
    SceneCompleted { scene: usize, deadline: Duration },
    Finished,
    /// Swallowed at the tick boundary; the session continues.
    Fault(SequenceError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerPhase {
    /// Running the current scene's steps.
    Active,
    /// Scene done; waiting until `deadline` before moving on.
    Pausing { deadline: Duration },
    Finished,
}

// ════════════════════════════════════════════════════════════════════════════
// SceneSequencer
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct SceneSequencer {
    scenes:      Vec<SceneConfig>,
    index:       usize,
    active:      Option<Scene>,
    phase:       SequencerPhase,
    pause:       Duration,
    finale_text: String,
    fault:       Option<SequenceError>,
}

impl SceneSequencer {
    pub fn new(cfg: SequenceConfig) -> Self {
        let mut seq = SceneSequencer {
            scenes:      cfg.scenes,
            index:       0,
            active:      None,
            phase:       SequencerPhase::Active,
            pause:       Duration::from_millis(cfg.pause_ms),
            finale_text: cfg.finale_text,
            fault:       None,
        };
        match seq.scenes.first() {
            Some(first) => {
                info!(scenes = seq.scenes.len(), first = %first.name, "sequence starting");
                seq.active = Some(Scene::from_config(first));
            }
            None => {
                info!("sequence has no scenes; finished");
                seq.phase = SequencerPhase::Finished;
            }
        }
        seq
    }

    /// Advance the session by one frame.
    ///
    /// This is the error boundary: any [`SequenceError`] raised while
    /// advancing is logged, reported as [`SequencerEvent::Fault`] and shown
    /// as a fallback prompt for this frame only.
    pub fn tick(&mut self, now: Duration, tracker: &mut dyn TrackingSource) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        self.fault = None;

        if let Err(err) = self.advance(now, tracker, &mut events) {
            warn!(scene = self.index, error = %err, "tick failed; continuing");
            events.push(SequencerEvent::Fault(err.clone()));
            self.fault = Some(err);
        }
        events
    }

    fn advance(
        &mut self,
        now:     Duration,
        tracker: &mut dyn TrackingSource,
        events:  &mut Vec<SequencerEvent>,
    ) -> Result<(), SequenceError> {
        match self.phase {
            SequencerPhase::Finished => Ok(()),

            SequencerPhase::Pausing { deadline } => {
                if now >= deadline {
                    self.next_scene(events);
                }
                Ok(())
            }

            SequencerPhase::Active => {
                let scene_idx = self.index;
                let Some(scene) = self.active.as_mut() else {
                    return Ok(());
                };

                if let Some(step) = scene.steps.get_mut(scene.step_index) {
                    let step_idx = scene.step_index;
                    match step.update(now, tracker)? {
                        StepUpdate::Idle => {}
                        StepUpdate::Calibrated { threshold, adaptive } => {
                            events.push(SequencerEvent::Calibrated {
                                scene: scene_idx, step: step_idx, threshold, adaptive,
                            });
                        }
                        StepUpdate::Confirmed { cue, .. } => {
                            if cue {
                                events.push(SequencerEvent::CueRequested {
                                    scene: scene_idx, step: step_idx, mode: step.mode(),
                                });
                            }
                        }
                        StepUpdate::TimedOut => {}
                    }

                    if step.is_complete() {
                        let confirmed = step.phase() == StepPhase::Succeeded;
                        events.push(SequencerEvent::StepCompleted {
                            scene: scene_idx, step: step_idx, confirmed,
                        });
                        scene.step_index += 1;
                        debug!(scene = scene_idx, step = step_idx, "step complete");
                    }
                } else {
                    let gap = SequenceError::ConfigurationGap {
                        scene: scene.name.clone(),
                        what:  "interaction steps",
                    };
                    debug!(%gap, "auto-completing scene");
                }

                if scene.is_complete() {
                    let deadline = now + self.pause;
                    self.phase = SequencerPhase::Pausing { deadline };
                    info!(scene = scene_idx, name = %scene.name, ?deadline, "scene complete");
                    events.push(SequencerEvent::SceneCompleted { scene: scene_idx, deadline });
                }
                Ok(())
            }
        }
    }

    fn next_scene(&mut self, events: &mut Vec<SequencerEvent>) {
        self.index += 1;
        match self.scenes.get(self.index) {
            Some(cfg) => {
                info!(scene = self.index, name = %cfg.name, "scene starting");
                self.active = Some(Scene::from_config(cfg));
                self.phase  = SequencerPhase::Active;
                events.push(SequencerEvent::SceneStarted { scene: self.index, name: cfg.name.clone() });
            }
            None => {
                info!("sequence finished");
                self.active = None;
                self.phase  = SequencerPhase::Finished;
                events.push(SequencerEvent::Finished);
            }
        }
    }

    // ── Render-facing accessors ───────────────────────────────────────────

    /// What to tell the user this frame.
    pub fn prompt_text(&self, now: Duration) -> String {
        if self.fault.is_some() {
            return PROMPT_FAULT.to_string();
        }
        let Some(scene) = self.active.as_ref() else {
            return self.finale_text.clone();
        };

        // A just-finished step keeps the stage until its feedback expires.
        if let Some(prev) = scene.previous_step() {
            if prev.feedback_active(now) || scene.is_complete() {
                return prev.prompt_text(now);
            }
        }
        match scene.current_step() {
            Some(step) => step.prompt_text(now),
            None       => String::new(),
        }
    }

    /// The active step is live and declared an overlay.
    pub fn is_overlay_visible(&self) -> bool {
        self.phase == SequencerPhase::Active
            && self.current_step().map(|s| s.wants_overlay()).unwrap_or(false)
    }

    /// Overlay frames (and opacities) to draw at `now`, if visible.
    pub fn overlay_frame_selection(&self, now: Duration) -> Option<FrameSelection> {
        let visible = self.is_overlay_visible();
        self.current_step()
            .and_then(|s| s.hooks().overlay.as_ref())
            .and_then(|o| o.select(now, visible))
    }

    /// Asset key of an overlay frame of the current step.
    pub fn overlay_frame(&self, index: usize) -> Option<&str> {
        self.current_step()
            .and_then(|s| s.hooks().overlay.as_ref())
            .and_then(|o| o.frame(index))
    }

    pub fn current_step(&self) -> Option<&InteractionStep> {
        self.active.as_ref().and_then(|s| s.current_step())
    }

    pub fn current_scene(&self) -> Option<&Scene> { self.active.as_ref() }

    /// Index of the current scene; equals the scene count once finished.
    pub fn current_scene_index(&self) -> usize { self.index }

    pub fn scene_count(&self) -> usize { self.scenes.len() }

    pub fn phase(&self) -> SequencerPhase { self.phase }

    pub fn is_finished(&self) -> bool { self.phase == SequencerPhase::Finished }

    pub fn transition_deadline(&self) -> Option<Duration> {
        match self.phase {
            SequencerPhase::Pausing { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// The error swallowed by the most recent tick, if any.
    pub fn last_fault(&self) -> Option<&SequenceError> { self.fault.as_ref() }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StepConfig;
    use crate::step::{PROMPT_DONE, PROMPT_STARTING, PROMPT_SUCCESS};
    use crate::test_support::ScriptedTracker;

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn quick(mode: GestureMode) -> StepConfig {
        StepConfig::new(mode).static_threshold(0.5)
    }

    fn scene(name: &str, steps: Vec<StepConfig>) -> SceneConfig {
        SceneConfig { name: name.to_string(), suit: None, steps }
    }

    fn seq(scenes: Vec<SceneConfig>) -> SceneSequencer {
        SceneSequencer::new(SequenceConfig::new(scenes))
    }

    #[test]
    fn two_step_scene_completes_and_waits_for_deadline() {
        let mut s = seq(vec![
            scene("A", vec![quick(GestureMode::Smile), quick(GestureMode::JawOpen)]),
            scene("B", vec![quick(GestureMode::Pinch)]),
        ]);
        // Ticks 1–5 feed step 1, ticks 6–9 feed step 2.
        let mut tracker = ScriptedTracker::with_scores(&[
            0.1, 0.1, 0.1, 0.1, 0.9,
            0.1, 0.1, 0.1, 0.9,
        ]);

        for tick in 1..=4 {
            let ev = s.tick(ms(tick), &mut tracker);
            assert!(!ev.iter().any(|e| matches!(e, SequencerEvent::StepCompleted { .. })), "tick {}", tick);
        }
        let ev = s.tick(ms(5), &mut tracker);
        assert!(ev.contains(&SequencerEvent::StepCompleted { scene: 0, step: 0, confirmed: true }));
        assert_eq!(s.current_scene().unwrap().step_index(), 1);

        for tick in 6..=8 {
            s.tick(ms(tick), &mut tracker);
            assert_eq!(s.phase(), SequencerPhase::Active);
        }
        let ev = s.tick(ms(9), &mut tracker);
        assert!(ev.contains(&SequencerEvent::SceneCompleted { scene: 0, deadline: ms(2009) }));
        assert_eq!(s.transition_deadline(), Some(ms(2009)));

        // Deadline is set once, not pushed back by later ticks.
        s.tick(ms(1000), &mut tracker);
        s.tick(ms(2008), &mut tracker);
        assert_eq!(s.current_scene_index(), 0);
        assert_eq!(s.transition_deadline(), Some(ms(2009)));

        let ev = s.tick(ms(2009), &mut tracker);
        assert_eq!(s.current_scene_index(), 1);
        assert!(ev.contains(&SequencerEvent::SceneStarted { scene: 1, name: "B".into() }));
        assert_eq!(s.current_step().unwrap().phase(), StepPhase::Starting);
    }

    #[test]
    fn empty_scene_completes_on_next_tick() {
        let mut s = seq(vec![scene("Blank", vec![]), scene("Next", vec![quick(GestureMode::Smile)])]);
        let mut tracker = ScriptedTracker::not_ready();
        let ev = s.tick(ms(0), &mut tracker);
        assert!(ev.contains(&SequencerEvent::SceneCompleted { scene: 0, deadline: ms(2000) }));
        assert_eq!(tracker.score_calls, 0);
        assert_eq!(tracker.start_requests, 0);
    }

    #[test]
    fn no_scenes_is_finished_immediately() {
        let mut s = seq(vec![]);
        assert!(s.is_finished());
        assert!(s.tick(ms(0), &mut ScriptedTracker::not_ready()).is_empty());
        assert_eq!(s.prompt_text(ms(0)), SequenceConfig::new(vec![]).finale_text);
    }

    #[test]
    fn scene_index_is_monotonic_through_finish() {
        let mut s = seq(vec![scene("A", vec![]), scene("B", vec![]), scene("C", vec![])]);
        let mut tracker = ScriptedTracker::not_ready();
        let mut last = 0;
        let mut finished_events = 0;
        for t in 0..20_000u64 {
            let ev = s.tick(ms(t), &mut tracker);
            finished_events += ev.iter().filter(|e| **e == SequencerEvent::Finished).count();
            assert!(s.current_scene_index() >= last);
            last = s.current_scene_index();
        }
        assert!(s.is_finished());
        assert_eq!(s.current_scene_index(), 3);
        assert_eq!(finished_events, 1);
    }

    #[test]
    fn cue_requested_once_per_success() {
        let mut s = seq(vec![scene("A", vec![quick(GestureMode::Smile)])]);
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.9, 0.1, 0.9]);
        let cues: usize = (0..10)
            .flat_map(|t| s.tick(ms(t), &mut tracker))
            .filter(|e| matches!(e, SequencerEvent::CueRequested { .. }))
            .count();
        assert_eq!(cues, 1);
    }

    #[test]
    fn fault_is_contained_to_one_frame() {
        let mut s = seq(vec![scene("A", vec![quick(GestureMode::Smile)])]);
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.1, 0.9]);
        tracker.fail_at(1);

        s.tick(ms(0), &mut tracker);
        let ev = s.tick(ms(16), &mut tracker);
        assert!(matches!(ev.as_slice(), [SequencerEvent::Fault(SequenceError::ScoreSource { .. })]));
        assert_eq!(s.prompt_text(ms(16)), PROMPT_FAULT);
        assert!(s.last_fault().is_some());

        s.tick(ms(32), &mut tracker);
        assert!(s.last_fault().is_none());
        assert_ne!(s.prompt_text(ms(32)), PROMPT_FAULT);
        let ev = s.tick(ms(48), &mut tracker);
        assert!(ev.iter().any(|e| matches!(e, SequencerEvent::CueRequested { .. })));
    }

    #[test]
    fn prompt_shows_success_then_next_step() {
        let mut s = seq(vec![scene("A", vec![quick(GestureMode::Smile), quick(GestureMode::Pinch)])]);
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.9]);
        s.tick(ms(0), &mut tracker);
        s.tick(ms(10), &mut tracker);
        assert_eq!(s.prompt_text(ms(10)), PROMPT_SUCCESS);
        assert_eq!(s.prompt_text(ms(1209)), PROMPT_SUCCESS);
        // Feedback over: the second step's own prompt takes over.
        assert_eq!(s.prompt_text(ms(1210)), PROMPT_STARTING);
    }

    #[test]
    fn prompt_during_pause_is_last_step() {
        let mut s = seq(vec![scene("A", vec![quick(GestureMode::Smile)]), scene("B", vec![])]);
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.9]);
        s.tick(ms(0), &mut tracker);
        s.tick(ms(10), &mut tracker);
        assert!(matches!(s.phase(), SequencerPhase::Pausing { .. }));
        assert_eq!(s.prompt_text(ms(1500)), PROMPT_DONE);
    }

    #[test]
    fn overlay_visible_only_while_step_active() {
        let step = StepConfig::new(GestureMode::Smile)
            .static_threshold(0.5)
            .overlay(&["f0", "f1"], 100, false);
        let mut s = seq(vec![scene("A", vec![step]), scene("B", vec![])]);
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.9]);

        assert!(s.is_overlay_visible());
        let sel = s.overlay_frame_selection(ms(150)).unwrap();
        assert_eq!(sel.layers[0].index, 1);
        assert_eq!(s.overlay_frame(1), Some("f1"));

        s.tick(ms(0), &mut tracker);
        s.tick(ms(16), &mut tracker);
        assert!(!s.is_overlay_visible());
        assert_eq!(s.overlay_frame_selection(ms(150)), None);
    }

    #[test]
    fn next_scene_steps_start_fresh() {
        let cfg = quick(GestureMode::Smile);
        let mut s = SceneSequencer::new(SequenceConfig {
            pause_ms: 0,
            ..SequenceConfig::new(vec![scene("A", vec![cfg.clone()]), scene("B", vec![cfg])])
        });
        let mut tracker = ScriptedTracker::with_scores(&[0.1, 0.9]);
        s.tick(ms(0), &mut tracker);
        s.tick(ms(1), &mut tracker);
        s.tick(ms(2), &mut tracker);
        assert_eq!(s.current_scene_index(), 1);
        let step = s.current_step().unwrap();
        assert!(!step.is_complete());
        assert_eq!(step.threshold(), None);
    }
}

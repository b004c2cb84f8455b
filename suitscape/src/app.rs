//! Top-level application state.
//!
//! `AppState` owns the `SceneSequencer`, the `CuePlayer` and the suit
//! `Carousel`.  Each frame it ticks the sequencer against the tracker,
//! reacts to the emitted events and hands the visualizer a `SceneView`.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use scene_sequencer::{
    SceneSequencer, SequenceConfig, SequencerEvent, StepPhase, Score, Threshold, TrackingSource,
};
use tracing::{info, warn};

use crate::carousel::{Carousel, Pulse};
use crate::gesture::{SimInput, SimTracker, Tracker};
use crate::player::CuePlayer;
use crate::visualizer::Visualizer;

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Configuration for the full application.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub deck:          SequenceConfig,
    /// Spawn the MIDI cue thread; `false` plays nothing.
    pub audio:         bool,
    pub instrument:    u8,
    pub channel:       u8,
    /// Frames the simulated camera takes to come up.
    pub warmup_frames: u32,
    /// Read pinch from a LeapMotion controller instead of the keyboard.
    pub use_leap:      bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            deck:          SequenceConfig::suitscapes(),
            audio:         true,
            instrument:    11,   // Vibraphone
            channel:       0,
            warmup_frames: 45,
            use_leap:      false,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SceneView — one frame's worth of render input
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayTile {
    pub label:   String,
    pub opacity: f32,
}

pub struct SceneView<'a> {
    pub prompt:      String,
    pub scene_label: String,
    pub status:      &'a str,
    pub carousel:    &'a Carousel,
    pub tiles:       Vec<OverlayTile>,
    /// Calibration progress 0.0–1.0 while the step is calibrating.
    pub calibration: Option<f32>,
    /// Live score against the threshold while awaiting the gesture.
    pub meter:       Option<(Score, Threshold)>,
    /// Confirmation flash intensity, 0.0 when idle.
    pub pulse:       f32,
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    seq:      SceneSequencer,
    player:   CuePlayer,
    carousel: Carousel,
    pulse:    Option<Pulse>,
    pub status: String,
}

impl AppState {
    pub fn new(cfg: &AppConfig) -> Self {
        let player = if cfg.audio {
            CuePlayer::spawn(cfg.instrument, cfg.channel)
        } else {
            CuePlayer::silent()
        };
        AppState::with_player(cfg.deck.clone(), player)
    }

    pub fn with_player(deck: SequenceConfig, player: CuePlayer) -> Self {
        let seq = SceneSequencer::new(deck);
        let mut carousel = Carousel::new();
        carousel.set_focus(seq.current_scene().and_then(|s| s.suit()));
        let status = match seq.current_scene() {
            Some(s) => format!("scene 1/{}: {}", seq.scene_count(), s.name()),
            None    => "empty deck".to_string(),
        };
        AppState { seq, player, carousel, pulse: None, status }
    }

    // ── process one SequencerEvent ────────────────────────────────────────

    pub fn handle_event(&mut self, event: &SequencerEvent) {
        match event {
            SequencerEvent::SceneStarted { scene, name } => {
                self.carousel.set_focus(self.seq.current_scene().and_then(|s| s.suit()));
                self.status = format!("scene {}/{}: {}", scene + 1, self.seq.scene_count(), name);
            }
            SequencerEvent::Calibrated { threshold, adaptive, .. } => {
                let how = if *adaptive { "calibrated" } else { "fallback" };
                self.status = format!("threshold {:.2} ({})", threshold, how);
            }
            SequencerEvent::CueRequested { mode, .. } => {
                self.player.beep(*mode);
                self.carousel.kick(0.8);
                self.pulse = Some(Pulse::new());
            }
            SequencerEvent::StepCompleted { confirmed: false, .. } => {
                self.status = "step skipped".to_string();
            }
            SequencerEvent::StepCompleted { confirmed: true, step, .. } => {
                self.status = format!("step {} confirmed", step + 1);
            }
            SequencerEvent::SceneCompleted { scene, .. } => {
                self.status = format!("scene {} complete", scene + 1);
            }
            SequencerEvent::Finished => {
                info!("deck finished");
                self.player.finale();
                self.carousel.set_focus(None);
                self.carousel.kick(1.0);
                self.status = "deck complete".to_string();
            }
            SequencerEvent::Fault(err) => {
                warn!(error = %err, "frame dropped");
                self.status = format!("tracking fault: {}", err);
            }
        }
    }

    // ── Per-frame tick ────────────────────────────────────────────────────

    /// Advance the sequencer and animations by one frame; returns the
    /// events the sequencer emitted.
    pub fn tick(&mut self, now: Duration, tracker: &mut dyn TrackingSource) -> Vec<SequencerEvent> {
        let events = self.seq.tick(now, tracker);
        for ev in &events {
            self.handle_event(ev);
        }

        self.carousel.tick();
        if let Some(p) = self.pulse.as_mut() {
            p.tick();
            if p.done() { self.pulse = None; }
        }
        events
    }

    /// Snapshot everything the visualizer needs for `now`.
    pub fn view(&self, now: Duration) -> SceneView<'_> {
        let tiles = self.seq.overlay_frame_selection(now)
            .map(|sel| sel.layers.iter().filter_map(|layer| {
                self.seq.overlay_frame(layer.index).map(|key| OverlayTile {
                    label:   key.to_string(),
                    opacity: layer.opacity,
                })
            }).collect())
            .unwrap_or_default();

        let step = self.seq.current_step();
        let calibration = step
            .filter(|s| s.phase() == StepPhase::Calibrating)
            .map(|s| s.calibration_progress());
        let meter = step
            .filter(|s| s.phase() == StepPhase::AwaitingGesture)
            .and_then(|s| s.threshold().map(|t| (s.last_score(), t)));

        let scene_label = match self.seq.current_scene() {
            Some(scene) => format!(
                "{}  {}/{}", scene.name(), self.seq.current_scene_index() + 1, self.seq.scene_count(),
            ),
            None => "Suitscapes".to_string(),
        };

        SceneView {
            prompt: self.seq.prompt_text(now),
            scene_label,
            status: &self.status,
            carousel: &self.carousel,
            tiles,
            calibration,
            meter,
            pulse: self.pulse.map(|p| p.intensity()).unwrap_or(0.0),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn sequencer(&self) -> &SceneSequencer { &self.seq }
    pub fn carousel(&self)  -> &Carousel       { &self.carousel }
    pub fn player(&self)    -> &CuePlayer      { &self.player }
    pub fn is_pulsing(&self) -> bool           { self.pulse.is_some() }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// Creates the visualizer and the tracking backend (keyboard simulation
/// unless `use_leap` is set and the `leap` feature is compiled in), then
/// drives the tick/render loop at ~60 fps until the window closes.
pub fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    let mut tracker = make_tracker(&cfg, sim_rx);
    info!(backend = tracker.describe(), "tracking backend selected");

    let mut vis = Visualizer::new(sim_tx)?;
    let mut app = AppState::new(&cfg);
    let start   = Instant::now();

    while vis.is_open() {
        if !vis.poll_input() { break; }

        tracker.advance_frame();
        let now = start.elapsed();
        app.tick(now, &mut tracker);

        vis.render(&app.view(now));
    }

    info!(
        finished = app.sequencer().is_finished(),
        scene    = app.sequencer().current_scene_index(),
        "window closed",
    );
    Ok(())
}

fn make_tracker(cfg: &AppConfig, sim_rx: mpsc::Receiver<SimInput>) -> Tracker {
    if cfg.use_leap {
        #[cfg(feature = "leap")]
        return Tracker::Leap(crate::gesture::LeapTracker::new());
        #[cfg(not(feature = "leap"))]
        warn!("built without the `leap` feature; using keyboard simulation");
    }
    Tracker::Sim(SimTracker::new(sim_rx, cfg.warmup_frames))
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! Tracking backends for the sketch: keyboard simulation and LeapMotion.
//!
//! Both implement [`TrackingSource`], so the sequencer can't tell whether
//! scores came from a real sensor or from someone holding down `S`.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Receiver;

use scene_sequencer::{GestureMode, Score, TrackingError, TrackingSource};
use tracing::{debug, info};

// ════════════════════════════════════════════════════════════════════════════
// SimInput — raw key events from the visualizer window
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Debug, PartialEq)]
pub enum SimInput {
    KeyDown(SimKey),
    KeyUp(SimKey),
}

/// Simulated key codes (mapped from minifb Key).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SimKey {
    Smile,       // S
    JawOpen,     // J
    BrowRaise,   // B
    EyesClosed,  // E
    Pinch,       // P
    /// Make the next score sample fail, as a crashing model would.
    Glitch,      // G
}

impl SimKey {
    pub fn mode(self) -> Option<GestureMode> {
        match self {
            SimKey::Smile      => Some(GestureMode::Smile),
            SimKey::JawOpen    => Some(GestureMode::JawOpen),
            SimKey::BrowRaise  => Some(GestureMode::BrowRaise),
            SimKey::EyesClosed => Some(GestureMode::EyesClosed),
            SimKey::Pinch      => Some(GestureMode::Pinch),
            SimKey::Glitch     => None,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimTracker — keyboard-driven scores
// ════════════════════════════════════════════════════════════════════════════

/// Resting level of every simulated expression.
const NEUTRAL:   f32 = 0.08;
/// Level reached while the key is held.
const ENGAGED:   f32 = 0.92;
/// Fraction of the distance to the target covered per frame.
const ATTACK:    f32 = 0.18;
/// Amplitude of the per-frame wobble standing in for model noise.
const WOBBLE:    f32 = 0.025;

/// Simulated face/hand: each held key pulls its gesture's score up, release
/// lets it relax back to a slightly noisy neutral.
///
/// The "camera" takes `warmup_frames` frames after the first start request
/// before it reports ready.
pub struct SimTracker {
    rx:              Receiver<SimInput>,
    held:            HashSet<GestureMode>,
    levels:          HashMap<GestureMode, f32>,
    start_requested: bool,
    warmup_frames:   u32,
    frames_since_start: u32,
    glitch_pending:  bool,
    frame:           u64,
}

impl SimTracker {
    pub fn new(rx: Receiver<SimInput>, warmup_frames: u32) -> Self {
        SimTracker {
            rx,
            held:            HashSet::new(),
            levels:          GestureMode::ALL.iter().map(|&m| (m, NEUTRAL)).collect(),
            start_requested: false,
            warmup_frames,
            frames_since_start: 0,
            glitch_pending:  false,
            frame:           0,
        }
    }

    /// Drain pending window input and move the simulated face one frame on.
    pub fn advance_frame(&mut self) {
        while let Ok(input) = self.rx.try_recv() {
            match input {
                SimInput::KeyDown(SimKey::Glitch) => {
                    debug!("simulated sampling failure armed");
                    self.glitch_pending = true;
                }
                SimInput::KeyDown(k) => {
                    if let Some(m) = k.mode() { self.held.insert(m); }
                }
                SimInput::KeyUp(k) => {
                    if let Some(m) = k.mode() { self.held.remove(&m); }
                }
            }
        }

        if self.start_requested && self.frames_since_start < self.warmup_frames {
            self.frames_since_start += 1;
            if self.frames_since_start == self.warmup_frames {
                info!(frames = self.warmup_frames, "simulated camera ready");
            }
        }

        for (mode, level) in self.levels.iter_mut() {
            let target = if self.held.contains(mode) { ENGAGED } else { NEUTRAL };
            *level += (target - *level) * ATTACK;
        }
        self.frame += 1;
    }

    pub fn level(&self, mode: GestureMode) -> f32 {
        self.levels.get(&mode).copied().unwrap_or(0.0)
    }

    fn wobble(&self, mode: GestureMode) -> f32 {
        let phase = self.frame as f32 * 0.37 + mode as u8 as f32 * 1.7;
        WOBBLE * phase.sin()
    }
}

impl TrackingSource for SimTracker {
    fn request_start(&mut self) -> Result<(), TrackingError> {
        if !self.start_requested {
            info!(warmup = self.warmup_frames, "simulated camera starting");
            self.start_requested = true;
        }
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.start_requested && self.frames_since_start >= self.warmup_frames
    }

    fn score(&mut self, mode: GestureMode) -> Result<Score, TrackingError> {
        if self.glitch_pending {
            self.glitch_pending = false;
            return Err(TrackingError::Sampling("simulated model glitch".into()));
        }
        Ok((self.level(mode) + self.wobble(mode)).clamp(0.0, 1.0))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapTracker — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Pinch scores from a LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Face modes always read 0: the controller sees hands only.
///
/// A polling thread is spawned on the first start request and forwards the
/// strongest pinch of each tracking frame over a channel.
#[cfg(feature = "leap")]
pub struct LeapTracker {
    rx:      Option<Receiver<LeapMsg>>,
    ready:   bool,
    pinch:   f32,
}

#[cfg(feature = "leap")]
enum LeapMsg {
    Connected,
    Pinch(f32),
    Failed(String),
}

#[cfg(feature = "leap")]
impl LeapTracker {
    pub fn new() -> Self {
        LeapTracker { rx: None, ready: false, pinch: 0.0 }
    }

    /// Drain messages from the polling thread.
    pub fn advance_frame(&mut self) {
        let Some(rx) = self.rx.as_ref() else { return };
        while let Ok(msg) = rx.try_recv() {
            match msg {
                LeapMsg::Connected => {
                    info!("LeapMotion connected");
                    self.ready = true;
                }
                LeapMsg::Pinch(p) => self.pinch = p,
                LeapMsg::Failed(e) => {
                    tracing::warn!(error = %e, "LeapMotion polling stopped");
                    self.ready = false;
                }
            }
        }
    }
}

#[cfg(feature = "leap")]
impl Default for LeapTracker {
    fn default() -> Self { Self::new() }
}

#[cfg(feature = "leap")]
impl TrackingSource for LeapTracker {
    fn request_start(&mut self) -> Result<(), TrackingError> {
        if self.rx.is_some() {
            return Ok(());
        }
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::Builder::new()
            .name("leap-poll".into())
            .spawn(move || leap_poll(tx))
            .map_err(|e| TrackingError::Unavailable(e.to_string()))?;
        self.rx = Some(rx);
        Ok(())
    }

    fn is_ready(&self) -> bool { self.ready }

    fn score(&mut self, mode: GestureMode) -> Result<Score, TrackingError> {
        Ok(if mode == GestureMode::Pinch { self.pinch.clamp(0.0, 1.0) } else { 0.0 })
    }
}

#[cfg(feature = "leap")]
fn leap_poll(tx: std::sync::mpsc::Sender<LeapMsg>) {
    use leaprs::*;

    let mut connection = match Connection::create(ConnectionConfig::default()) {
        Ok(c)  => c,
        Err(e) => { let _ = tx.send(LeapMsg::Failed(format!("{:?}", e))); return; }
    };
    if let Err(e) = connection.open() {
        let _ = tx.send(LeapMsg::Failed(format!("{:?}", e)));
        return;
    }
    if tx.send(LeapMsg::Connected).is_err() { return; }

    loop {
        let msg = match connection.poll(100) {
            Ok(m)  => m,
            Err(_) => continue,
        };
        if let Event::Tracking(frame) = msg.event() {
            // No hands in view reads as no pinch.
            let pinch = frame.hands()
                .map(|h| h.pinch_strength)
                .fold(0.0_f32, f32::max);
            if tx.send(LeapMsg::Pinch(pinch)).is_err() { return; }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tracker — the backend the app actually holds
// ════════════════════════════════════════════════════════════════════════════

pub enum Tracker {
    Sim(SimTracker),
    #[cfg(feature = "leap")]
    Leap(LeapTracker),
}

impl Tracker {
    pub fn advance_frame(&mut self) {
        match self {
            Tracker::Sim(t)  => t.advance_frame(),
            #[cfg(feature = "leap")]
            Tracker::Leap(t) => t.advance_frame(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Tracker::Sim(_)  => "keyboard simulation",
            #[cfg(feature = "leap")]
            Tracker::Leap(_) => "LeapMotion",
        }
    }
}

impl TrackingSource for Tracker {
    fn request_start(&mut self) -> Result<(), TrackingError> {
        match self {
            Tracker::Sim(t)  => t.request_start(),
            #[cfg(feature = "leap")]
            Tracker::Leap(t) => t.request_start(),
        }
    }

    fn is_ready(&self) -> bool {
        match self {
            Tracker::Sim(t)  => t.is_ready(),
            #[cfg(feature = "leap")]
            Tracker::Leap(t) => t.is_ready(),
        }
    }

    fn score(&mut self, mode: GestureMode) -> Result<Score, TrackingError> {
        match self {
            Tracker::Sim(t)  => t.score(mode),
            #[cfg(feature = "leap")]
            Tracker::Leap(t) => t.score(mode),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Sender};

    fn sim(warmup: u32) -> (Sender<SimInput>, SimTracker) {
        let (tx, rx) = mpsc::channel();
        (tx, SimTracker::new(rx, warmup))
    }

    #[test]
    fn not_ready_until_warmup_after_request() {
        let (_tx, mut t) = sim(3);
        for _ in 0..10 { t.advance_frame(); }
        assert!(!t.is_ready(), "must not be ready before a start request");
        t.request_start().unwrap();
        t.advance_frame();
        t.advance_frame();
        assert!(!t.is_ready());
        t.advance_frame();
        assert!(t.is_ready());
    }

    #[test]
    fn held_key_raises_score_release_relaxes() {
        let (tx, mut t) = sim(0);
        tx.send(SimInput::KeyDown(SimKey::Smile)).unwrap();
        for _ in 0..40 { t.advance_frame(); }
        assert!(t.score(GestureMode::Smile).unwrap() > 0.8);
        assert!(t.score(GestureMode::JawOpen).unwrap() < 0.15);

        tx.send(SimInput::KeyUp(SimKey::Smile)).unwrap();
        for _ in 0..40 { t.advance_frame(); }
        assert!(t.score(GestureMode::Smile).unwrap() < 0.15);
    }

    #[test]
    fn glitch_fails_exactly_one_sample() {
        let (tx, mut t) = sim(0);
        tx.send(SimInput::KeyDown(SimKey::Glitch)).unwrap();
        t.advance_frame();
        assert!(t.score(GestureMode::Smile).is_err());
        assert!(t.score(GestureMode::Smile).is_ok());
    }

    #[test]
    fn scores_stay_in_unit_range() {
        let (tx, mut t) = sim(0);
        tx.send(SimInput::KeyDown(SimKey::Pinch)).unwrap();
        for _ in 0..200 {
            t.advance_frame();
            for m in GestureMode::ALL {
                let s = t.score(m).unwrap();
                assert!((0.0..=1.0).contains(&s), "{} = {}", m, s);
            }
        }
    }

    #[test]
    fn tracker_enum_delegates() {
        let (_tx, t) = sim(0);
        let mut tracker = Tracker::Sim(t);
        assert!(!tracker.is_ready());
        tracker.request_start().unwrap();
        assert!(tracker.is_ready());
        assert_eq!(tracker.describe(), "keyboard simulation");
    }
}

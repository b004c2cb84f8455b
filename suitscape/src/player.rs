//! Confirmation-cue playback thread.
//!
//! Cues are short MIDI notes sent to the first usable output port.  The
//! sequencer only ever asks for a cue; pitch, length and the port live here.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use scene_sequencer::GestureMode;
use tracing::{debug, info, warn};

// ════════════════════════════════════════════════════════════════════════════
// CueCommand — sent to the playback thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum CueCommand {
    /// One short note.
    Beep { note: u8, millis: u64 },
    /// Notes played back to back (the finale flourish).
    Phrase(Vec<u8>),
    /// Change instrument (MIDI program 0–127).
    SetInstrument(u8),
    /// Terminate the thread.
    Quit,
}

/// Pitch of the confirmation beep for each gesture.
pub fn cue_note(mode: GestureMode) -> u8 {
    match mode {
        GestureMode::Smile      => 76,  // E5
        GestureMode::JawOpen    => 72,  // C5
        GestureMode::BrowRaise  => 79,  // G5
        GestureMode::EyesClosed => 67,  // G4
        GestureMode::Pinch      => 84,  // C6
    }
}

/// Rising arpeggio played once the deck is finished.
pub const FINALE_PHRASE: [u8; 4] = [72, 76, 79, 84];

const BEEP_MS:   u64 = 180;
const PHRASE_MS: u64 = 140;
const VELOCITY:  u8  = 96;

// ════════════════════════════════════════════════════════════════════════════
// MidiOut — abstraction over midir / null
// ════════════════════════════════════════════════════════════════════════════

trait MidiOut: Send {
    fn program_change(&mut self, channel: u8, program: u8);
    fn note_on(&mut self,  channel: u8, note: u8, velocity: u8);
    fn note_off(&mut self, channel: u8, note: u8);
}

struct MidirOut {
    conn: midir::MidiOutputConnection,
}

impl MidiOut for MidirOut {
    fn program_change(&mut self, channel: u8, program: u8) {
        let _ = self.conn.send(&[0xC0 | (channel & 0x0F), program & 0x7F]);
    }
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        let _ = self.conn.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
    }
    fn note_off(&mut self, channel: u8, note: u8) {
        let _ = self.conn.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0]);
    }
}

// Used when no MIDI port is available; cues are silently dropped.
struct NullOut;
impl MidiOut for NullOut {
    fn program_change(&mut self, _ch: u8, _p: u8)   {}
    fn note_on(&mut self, _ch: u8, _n: u8, _v: u8)  {}
    fn note_off(&mut self, _ch: u8, _n: u8)          {}
}

/// Open the first MIDI output port, preferring a softsynth.
/// Falls back to `NullOut` with a warning if none is usable.
fn open_midi_output() -> Box<dyn MidiOut> {
    let midi_out = match midir::MidiOutput::new("suitscape_cues") {
        Ok(m)  => m,
        Err(e) => {
            warn!(error = %e, "MIDI init failed, cues will be silent");
            return Box::new(NullOut);
        }
    };

    let ports = midi_out.ports();
    if ports.is_empty() {
        warn!("no MIDI output ports found, cues will be silent (try `timidity -iA` or `fluidsynth`)");
        return Box::new(NullOut);
    }

    let port_idx = ports.iter().enumerate()
        .find(|(_, p)| {
            midi_out.port_name(p).map(|n| {
                let n = n.to_lowercase();
                n.contains("fluid") || n.contains("timidity") ||
                n.contains("microsoft") || n.contains("synth")
            }).unwrap_or(false)
        })
        .map(|(i, _)| i)
        .unwrap_or(0);

    let port = &ports[port_idx];
    let name = midi_out.port_name(port).unwrap_or_else(|_| "Unknown".to_string());
    info!(port = %name, "opening MIDI port");

    match midi_out.connect(port, "suitscape-cues") {
        Ok(conn) => Box::new(MidirOut { conn }),
        Err(e) => {
            warn!(error = %e, "MIDI connect failed, cues will be silent");
            Box::new(NullOut)
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CuePlayer — handle to the playback thread
// ════════════════════════════════════════════════════════════════════════════

/// Handle to the cue thread.  A silent player has no thread and just records
/// what it was asked to play; a live player keeps no history.
pub struct CuePlayer {
    cmd_tx: Option<Sender<CueCommand>>,
    sent:   Vec<CueCommand>,
}

impl CuePlayer {
    /// Spawn the playback thread on MIDI `channel` with `instrument`.
    pub fn spawn(instrument: u8, channel: u8) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<CueCommand>();
        let spawned = thread::Builder::new()
            .name("cue-player".into())
            .spawn(move || player_thread(instrument, channel, cmd_rx));
        match spawned {
            Ok(_) => CuePlayer { cmd_tx: Some(cmd_tx), sent: Vec::new() },
            Err(e) => {
                warn!(error = %e, "could not start cue thread, cues will be silent");
                CuePlayer::silent()
            }
        }
    }

    /// A player that never makes a sound (`--no-audio`, tests).
    pub fn silent() -> Self {
        CuePlayer { cmd_tx: None, sent: Vec::new() }
    }

    pub fn beep(&mut self, mode: GestureMode) {
        self.send(CueCommand::Beep { note: cue_note(mode), millis: BEEP_MS });
    }

    pub fn finale(&mut self) {
        self.send(CueCommand::Phrase(FINALE_PHRASE.to_vec()));
    }

    pub fn set_instrument(&mut self, program: u8) {
        self.send(CueCommand::SetInstrument(program & 0x7F));
    }

    /// Everything a silent player was asked to play, in order.
    pub fn history(&self) -> &[CueCommand] { &self.sent }

    pub fn is_silent(&self) -> bool { self.cmd_tx.is_none() }

    fn send(&mut self, cmd: CueCommand) {
        debug!(?cmd, "cue");
        match &self.cmd_tx {
            Some(tx) => {
                if tx.send(cmd).is_err() {
                    warn!("cue thread has exited");
                    self.cmd_tx = None;
                }
            }
            None => self.sent.push(cmd),
        }
    }
}

impl Drop for CuePlayer {
    fn drop(&mut self) {
        if let Some(tx) = &self.cmd_tx {
            let _ = tx.send(CueCommand::Quit);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// player_thread — the actual loop
// ════════════════════════════════════════════════════════════════════════════

fn player_thread(instrument: u8, channel: u8, cmd_rx: Receiver<CueCommand>) {
    let mut midi = open_midi_output();
    midi.program_change(channel, instrument);

    // Blocking receive: the thread idles between cues.
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            CueCommand::Beep { note, millis } => {
                play_note(midi.as_mut(), channel, note, millis);
            }
            CueCommand::Phrase(notes) => {
                for note in notes {
                    play_note(midi.as_mut(), channel, note, PHRASE_MS);
                }
            }
            CueCommand::SetInstrument(p) => midi.program_change(channel, p),
            CueCommand::Quit => return,
        }
    }
}

fn play_note(midi: &mut dyn MidiOut, channel: u8, note: u8, millis: u64) {
    midi.note_on(channel, note, VELOCITY);
    thread::sleep(Duration::from_millis(millis));
    midi.note_off(channel, note);
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

//! suitscape — interactive entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use scene_sequencer::SequenceConfig;
use suitscape::app::{run, AppConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "suitscape", about = "Gesture-gated suit scenes")]
struct Cli {
    /// Deck file (JSON); the built-in four-suit deck when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the deck as JSON and exit
    #[arg(long)]
    dump_deck: bool,

    /// Do not open a MIDI port
    #[arg(long)]
    no_audio: bool,

    /// General MIDI program for the cues
    #[arg(long, default_value_t = 11)]
    program: u8,

    /// Frames the simulated camera takes to start
    #[arg(long, default_value_t = 45)]
    warmup_frames: u32,

    /// Read pinch from a LeapMotion controller (needs the `leap` feature)
    #[arg(long)]
    leap: bool,

    /// Log filter, e.g. `scene_sequencer=debug` (overrides RUST_LOG)
    #[arg(long)]
    log: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log {
        Some(directives) => tracing_subscriber::EnvFilter::try_new(directives)
            .with_context(|| format!("bad --log filter {:?}", directives))?,
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "suitscape=info,scene_sequencer=info,signal_gate=info".into()),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let deck = match &cli.config {
        Some(path) => SequenceConfig::load(path)
            .with_context(|| format!("loading deck {}", path.display()))?,
        None => SequenceConfig::suitscapes(),
    };

    if cli.dump_deck {
        println!("{}", deck.to_json_pretty()?);
        return Ok(());
    }

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║            Suitscapes — gesture-gated suit scenes            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
    if cli.leap && cfg!(feature = "leap") {
        println!("  Mode: LeapMotion hardware (pinch only; face gestures read 0)");
    } else {
        println!("  Mode: Keyboard simulation  (use --features leap --leap for hardware)");
    }
    println!("  Deck: {} scenes", deck.scenes.len());
    println!();
    println!("  Opening visualizer window…");
    println!();

    info!(scenes = deck.scenes.len(), audio = !cli.no_audio, "starting");
    run(AppConfig {
        deck,
        audio:         !cli.no_audio,
        instrument:    cli.program.min(127),
        channel:       0,
        warmup_frames: cli.warmup_frames,
        use_leap:      cli.leap,
    })
}

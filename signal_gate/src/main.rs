//! gate_replay — run calibration + edge detection over a recorded score trace.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use signal_gate::{parse_trace, replay, CalibrationConfig, ReplayThreshold};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "gate_replay", about = "Replay a gesture score trace through the calibrator and edge detector")]
struct Cli {
    /// Trace file: one `t_ms,score` or `score` per line
    trace: PathBuf,

    /// Spacing for bare-score lines, in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Neutral samples to calibrate on
    #[arg(long, default_value_t = 60)]
    samples: usize,

    /// Offset added to the neutral mean
    #[arg(long, default_value_t = 0.18)]
    offset: f32,

    #[arg(long, default_value_t = 0.3)]
    lower: f32,

    #[arg(long, default_value_t = 0.8)]
    upper: f32,

    /// Skip calibration and use this threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// Minimum time between two events, in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signal_gate=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    debug!(?cli, "gate_replay starting");

    let text = std::fs::read_to_string(&cli.trace)
        .with_context(|| format!("reading {}", cli.trace.display()))?;
    let samples = parse_trace(&text, Duration::from_millis(cli.frame_ms))
        .with_context(|| format!("parsing {}", cli.trace.display()))?;

    let mode = match cli.threshold {
        Some(t) => ReplayThreshold::Static(t.clamp(0.0, 1.0)),
        None    => ReplayThreshold::Calibrated(CalibrationConfig {
            target_samples: cli.samples,
            offset:         cli.offset,
            lower_bound:    cli.lower.min(cli.upper),
            upper_bound:    cli.upper.max(cli.lower),
            ..CalibrationConfig::default()
        }),
    };
    let report = replay(&samples, &mode, cli.cooldown_ms.map(Duration::from_millis));

    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              Gesture Score Trace Replay              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  Samples     : {}", report.samples);
    match (report.threshold, report.calibrated_at) {
        (Some(t), Some(i)) => println!("  Threshold   : {:.3}  (calibrated at sample {})", t, i + 1),
        (Some(t), None)    => println!("  Threshold   : {:.3}  (static)", t),
        (None, _)          => println!("  Threshold   : —  (trace shorter than the calibration window)"),
    }
    println!("  Events      : {}", report.edges.len());
    if report.suppressed > 0 {
        println!("  Suppressed  : {}  (cooldown)", report.suppressed);
    }
    println!();
    for (i, ev) in report.edges.iter().enumerate() {
        println!(
            "  #{:<3} t={:>7} ms  score={:.3}  threshold={:.3}",
            i + 1, ev.at.as_millis(), ev.score, ev.threshold
        );
    }
    println!();
    Ok(())
}

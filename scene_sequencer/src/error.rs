//! Error taxonomy for the sequencing core and for deck loading.

use thiserror::Error;

use crate::gesture::GestureMode;
use crate::tracking::TrackingError;

/// Everything that can go wrong inside one tick.
///
/// None of these stop the session: the sequencer logs them, shows a
/// fallback prompt for the frame and carries on.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SequenceError {
    /// The tracking backend refused to start or never became ready.
    #[error("tracking unavailable: {0}")]
    TrackingUnavailable(String),

    /// Sampling a score failed or produced a non-finite value.
    #[error("score source failed for {mode}: {reason}")]
    ScoreSource { mode: GestureMode, reason: String },

    /// A scene or step has no content to run (no steps, no frames).
    #[error("scene `{scene}` has no {what}")]
    ConfigurationGap { scene: String, what: &'static str },
}

impl SequenceError {
    pub(crate) fn score_source(mode: GestureMode, err: TrackingError) -> Self {
        SequenceError::ScoreSource { mode, reason: err.to_string() }
    }
}

/// Problems loading or validating a deck.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read deck {path}: {source}")]
    Io {
        path:   String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed deck: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid deck: {0}")]
    Invalid(String),
}

//! # Error Module
//!
//! Typed errors for the parts of the tutor core that can actually fail.
//! Per-frame anomalies never show up here: they are absorbed inside the
//! frame they happen in. Only initialization-time problems propagate.

use thiserror::Error;

/// Failures reported by an external pose detector.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The hand-pose model could not be loaded. Fatal to hand detection only.
    #[error("pose detector failed to initialize: {0}")]
    Initialization(String),

    /// A single inference call failed. The frame is treated as "no hands".
    #[error("pose detector inference failed: {0}")]
    Inference(String),
}

/// Failures while reading or writing an engine configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Returned when a string cannot be read as a note identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse note name `{input}`: {reason}")]
pub struct NoteParseError {
    pub input: String,
    pub reason: &'static str,
}

/// Failures while reading a sheet-music piece.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("score is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Note(#[from] NoteParseError),

    #[error("tempo must be positive, got {0}")]
    Tempo(f32),
}

// tutor-core/src/lib.rs

//! The core logic for the camera piano tutor.
//! This crate turns a stream of hand landmarks into note start/end events
//! on a virtual keyboard drawn over the camera image. It is completely
//! headless and contains no GUI code.

pub mod config;
pub mod detection;
pub mod error;
pub mod hand;
pub mod keyboard;
pub mod note;
pub mod note_state;
pub mod press;
pub mod score;
pub mod session;
pub mod smoothing;

use hand::HandObservation;
use note_state::NoteTransitions;
use press::EngagedNote;
use std::time::Instant;

/// Represents the result of a single detection cycle.
// Cloned into the UI thread's message queue, hence the derive.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Sequence number of this cycle, starting at 1.
    pub frame: u64,
    /// When the cycle ran. Transitions in this report happened at this instant.
    pub captured_at: Instant,
    /// Smoothed hands, for drawing the landmark overlay.
    pub hands: Vec<HandObservation>,
    /// Every fingertip pressing a key, before per-note collapsing.
    pub engaged: Vec<EngagedNote>,
    /// Start/end edges produced this cycle.
    pub transitions: NoteTransitions,
    /// Notes sounding after this cycle, for highlighting keys.
    pub sounding: Vec<EngagedNote>,
}

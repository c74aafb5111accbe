//! # Practice Session Module
//!
//! The tutoring session's view of a performance: a time-stamped log of
//! what the student played next to what the score expected, ready to be
//! handed to the feedback service.
//!
//! ## Features
//! - Start/end events become timed notes with durations
//! - Practice mode restricts logging to one hand
//! - JSON payload in the shape the feedback service expects

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::detection::NoteListener;
use crate::hand::Handedness;
use crate::note::NoteName;
use crate::note_state::NoteTransitions;
use crate::score::{Chord, Score};

/// Which hands the student is practising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PracticeMode {
    Left,
    Right,
    #[default]
    Both,
}

impl PracticeMode {
    pub fn accepts(self, hand: Handedness) -> bool {
        match self {
            PracticeMode::Left => hand == Handedness::Left,
            PracticeMode::Right => hand == Handedness::Right,
            PracticeMode::Both => true,
        }
    }
}

/// A note on the session timeline. Times are seconds since session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedNote {
    pub note: NoteName,
    pub start_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand: Option<Handedness>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finger: Option<u8>,
}

/// Body of a feedback request: what should have been played and what was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub expected_notes: Vec<TimedNote>,
    pub played_notes: Vec<TimedNote>,
}

fn open_note(log: &mut Vec<TimedNote>, note: NoteName, finger: u8, hand: Handedness, at: f64) {
    log.push(TimedNote {
        note,
        start_time: at,
        duration: None,
        hand: Some(hand),
        finger: Some(finger),
    });
}

/// Closes the most recent still-open entry for `note`.
fn close_note(log: &mut [TimedNote], note: NoteName, finger: u8, hand: Handedness, at: f64) -> bool {
    match log
        .iter_mut()
        .rev()
        .find(|entry| entry.note == note && entry.duration.is_none())
    {
        Some(entry) => {
            entry.duration = Some((at - entry.start_time).max(0.0));
            entry.hand = Some(hand);
            entry.finger = Some(finger);
            true
        }
        None => false,
    }
}

/// Time-stamped log of one practice run.
#[derive(Debug, Clone)]
pub struct PerformanceLog {
    started_at: Instant,
    mode: PracticeMode,
    played: Vec<TimedNote>,
    expected: Vec<TimedNote>,
}

impl Default for PerformanceLog {
    fn default() -> Self {
        Self::new(PracticeMode::default())
    }
}

impl PerformanceLog {
    pub fn new(mode: PracticeMode) -> Self {
        Self {
            started_at: Instant::now(),
            mode,
            played: Vec::new(),
            expected: Vec::new(),
        }
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PracticeMode) {
        self.mode = mode;
    }

    /// Seconds since the session (re)started.
    pub fn elapsed(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Session time of `at`. Instants from before the last reset count as 0.
    pub fn session_time(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.started_at).as_secs_f64()
    }

    /// Clears both logs and restarts the clock.
    pub fn reset(&mut self) {
        self.played.clear();
        self.expected.clear();
        self.started_at = Instant::now();
    }

    pub fn played(&self) -> &[TimedNote] {
        &self.played
    }

    pub fn expected(&self) -> &[TimedNote] {
        &self.expected
    }

    /// The note the student is holding most recently, if any.
    pub fn current_note(&self) -> Option<NoteName> {
        self.played
            .iter()
            .rev()
            .find(|entry| entry.duration.is_none())
            .map(|entry| entry.note)
    }

    pub fn record_start(&mut self, note: NoteName, finger: u8, hand: Handedness, at: f64) {
        if self.mode.accepts(hand) {
            open_note(&mut self.played, note, finger, hand, at);
        }
    }

    pub fn record_end(&mut self, note: NoteName, finger: u8, hand: Handedness, at: f64) {
        if !close_note(&mut self.played, note, finger, hand, at) {
            debug!(%note, "end without a matching start");
        }
    }

    pub fn expect_start(&mut self, note: NoteName, finger: u8, hand: Handedness, at: f64) {
        if self.mode.accepts(hand) {
            open_note(&mut self.expected, note, finger, hand, at);
        }
    }

    pub fn expect_end(&mut self, note: NoteName, finger: u8, hand: Handedness, at: f64) {
        close_note(&mut self.expected, note, finger, hand, at);
    }

    /// Logs one detection cycle's transitions at the time the cycle ran,
    /// ends before starts.
    pub fn record_transitions(&mut self, transitions: &NoteTransitions, at: Instant) {
        let at = self.session_time(at);
        for ended in &transitions.ended {
            self.record_end(ended.note, ended.finger_number(), ended.hand, at);
        }
        for started in &transitions.started {
            self.record_start(started.note, started.finger_number(), started.hand, at);
        }
    }

    /// Lays out every chord of `score` as expected notes from session start.
    pub fn expect_score(&mut self, score: &Score, hand: Handedness) {
        for scheduled in score.timeline() {
            self.expect_chord(scheduled.chord, hand, scheduled.start, scheduled.length);
        }
    }

    /// Records a whole chord as expected, from `start` for `length` seconds.
    pub fn expect_chord(&mut self, chord: &Chord, hand: Handedness, start: f64, length: f64) {
        for expected in &chord.notes {
            let finger = expected.finger.map(|f| f.number()).unwrap_or(1);
            self.expect_start(expected.note, finger, hand, start);
            self.expect_end(expected.note, finger, hand, start + length);
        }
    }

    pub fn feedback_request(&self) -> FeedbackRequest {
        FeedbackRequest {
            expected_notes: self.expected.clone(),
            played_notes: self.played.clone(),
        }
    }
}

impl NoteListener for PerformanceLog {
    fn on_note_start(&mut self, note: NoteName, finger: u8, hand: Handedness) {
        let at = self.elapsed();
        self.record_start(note, finger, hand, at);
    }

    fn on_note_end(&mut self, note: NoteName, finger: u8, hand: Handedness) {
        let at = self.elapsed();
        self.record_end(note, finger, hand, at);
    }
}

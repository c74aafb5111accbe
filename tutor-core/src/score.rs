//! # Score Ingestion Module
//!
//! Sheet-music notes as the notation layer stores them, and their
//! normalisation into uniform chords.
//!
//! In the notation data a `key` (and its `fingering`) may be a single
//! string or a list of strings. Both shapes are turned into a list of
//! simultaneous notes right here, so nothing downstream ever deals with
//! anything but single note identities.

use serde::{Deserialize, Serialize};

use crate::error::ScoreError;
use crate::hand::Finger;
use crate::note::NoteName;

/// Tempo of the built-in exercise, in beats per minute.
pub const DEFAULT_TEMPO: f32 = 80.0;

/// The right-hand warm-up shown when no other piece is loaded.
const DEFAULT_EXERCISE: &str = r#"[
    { "key": ["c/4", "e/4"], "duration": "q", "fingering": ["1", "3"] },
    { "key": "d/4", "duration": "q", "fingering": "2" },
    { "key": ["e/4", "g/4"], "duration": "h", "fingering": ["3", "5"] },
    { "key": "c/4", "duration": "q", "fingering": "1" },
    { "key": "d/4", "duration": "q", "fingering": "2" },
    { "key": "e/4", "duration": "h", "fingering": "3" },
    { "key": ["d/4", "f/4", "a/4"], "duration": "w", "fingering": ["2", "4", "5"] },
    { "key": "d/4", "duration": "8", "fingering": "2" },
    { "key": "e/4", "duration": "8", "fingering": "3" },
    { "key": "e/4", "duration": "8", "fingering": "3" },
    { "key": "e/4", "duration": "8", "fingering": "3" },
    { "key": ["e/4", "g/4", "b/4"], "duration": "h", "fingering": ["1", "3", "5"] }
]"#;

/// Either one value or a list of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Note length codes used by the notation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteDuration {
    #[serde(rename = "w")]
    Whole,
    #[serde(rename = "h")]
    Half,
    #[serde(rename = "q")]
    Quarter,
    #[serde(rename = "8")]
    Eighth,
    #[serde(rename = "16")]
    Sixteenth,
}

impl NoteDuration {
    /// Length in beats, with a quarter note as one beat.
    pub fn beats(self) -> f64 {
        match self {
            NoteDuration::Whole => 4.0,
            NoteDuration::Half => 2.0,
            NoteDuration::Quarter => 1.0,
            NoteDuration::Eighth => 0.5,
            NoteDuration::Sixteenth => 0.25,
        }
    }
}

/// One entry of a piece, exactly as stored by the notation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreNote {
    pub key: OneOrMany<String>,
    pub duration: NoteDuration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingering: Option<OneOrMany<String>>,
}

/// A note the student is expected to play, with its suggested finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedNote {
    pub note: NoteName,
    pub finger: Option<Finger>,
}

/// Notes sounding together for one duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub notes: Vec<ExpectedNote>,
    pub duration: NoteDuration,
}

impl ScoreNote {
    /// Normalises to a chord. Fingerings pair with keys by position; a
    /// missing or unreadable fingering leaves that note without one.
    pub fn normalize(self) -> Result<Chord, ScoreError> {
        let fingers: Vec<Option<Finger>> = self
            .fingering
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .iter()
            .map(|f| f.trim().parse::<u8>().ok().and_then(Finger::from_number))
            .collect();

        let notes = self
            .key
            .into_vec()
            .iter()
            .enumerate()
            .map(|(i, key)| -> Result<ExpectedNote, ScoreError> {
                Ok(ExpectedNote {
                    note: key.parse()?,
                    finger: fingers.get(i).copied().flatten(),
                })
            })
            .collect::<Result<Vec<_>, ScoreError>>()?;

        Ok(Chord {
            notes,
            duration: self.duration,
        })
    }
}

/// A chord placed on the timeline, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChord<'a> {
    pub start: f64,
    pub length: f64,
    pub chord: &'a Chord,
}

/// A normalised piece at a fixed tempo.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    /// Beats per minute.
    pub tempo: f32,
    pub chords: Vec<Chord>,
}

impl Score {
    pub fn new(tempo: f32, notes: Vec<ScoreNote>) -> Result<Self, ScoreError> {
        if !(tempo > 0.0) {
            return Err(ScoreError::Tempo(tempo));
        }
        let chords = notes
            .into_iter()
            .map(ScoreNote::normalize)
            .collect::<Result<_, _>>()?;
        Ok(Self { tempo, chords })
    }

    /// Parses a JSON array of notation entries.
    pub fn from_json(tempo: f32, json: &str) -> Result<Self, ScoreError> {
        let notes: Vec<ScoreNote> = serde_json::from_str(json)?;
        Self::new(tempo, notes)
    }

    /// Seconds per beat at this tempo.
    pub fn beat_length(&self) -> f64 {
        60.0 / self.tempo as f64
    }

    /// Start time and length of every chord, back to back.
    pub fn timeline(&self) -> Vec<ScheduledChord<'_>> {
        let beat = self.beat_length();
        let mut start = 0.0;
        self.chords
            .iter()
            .map(|chord| {
                let length = chord.duration.beats() * beat;
                let scheduled = ScheduledChord {
                    start,
                    length,
                    chord,
                };
                start += length;
                scheduled
            })
            .collect()
    }

    pub fn total_length(&self) -> f64 {
        self.chords.iter().map(|c| c.duration.beats()).sum::<f64>() * self.beat_length()
    }
}

/// The built-in warm-up at [`DEFAULT_TEMPO`].
pub fn default_exercise() -> Result<Score, ScoreError> {
    Score::from_json(DEFAULT_TEMPO, DEFAULT_EXERCISE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXERCISE: &str = r#"[
        { "key": ["c/4", "e/4"], "duration": "q", "fingering": ["1", "3"] },
        { "key": ["d/4"], "duration": "q", "fingering": "2" },
        { "key": "e/4", "duration": "h" },
        { "key": ["d/4", "f/4", "a/4"], "duration": "w", "fingering": ["2", "4"] }
    ]"#;

    fn n(s: &str) -> NoteName {
        s.parse().unwrap()
    }

    #[test]
    fn single_and_list_shapes_normalise_the_same() {
        let score = Score::from_json(80.0, EXERCISE).unwrap();
        assert_eq!(score.chords.len(), 4);

        assert_eq!(
            score.chords[0].notes,
            vec![
                ExpectedNote { note: n("C4"), finger: Some(Finger::Thumb) },
                ExpectedNote { note: n("E4"), finger: Some(Finger::Middle) },
            ]
        );
        assert_eq!(score.chords[1].notes[0].finger, Some(Finger::Index));
        assert_eq!(score.chords[2].notes, vec![ExpectedNote { note: n("E4"), finger: None }]);
        assert_eq!(score.chords[3].notes[2].finger, None);
    }

    #[test]
    fn timeline_follows_tempo() {
        let score = Score::from_json(120.0, EXERCISE).unwrap();
        let timeline = score.timeline();
        let starts: Vec<f64> = timeline.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0.0, 0.5, 1.0, 2.0]);
        assert_eq!(timeline[3].length, 2.0);
        assert_eq!(score.total_length(), 4.0);
    }

    #[test]
    fn bad_input_is_reported() {
        assert!(matches!(
            Score::from_json(80.0, r#"[{ "key": "x/4", "duration": "q" }]"#),
            Err(ScoreError::Note(_))
        ));
        assert!(matches!(
            Score::from_json(80.0, r#"[{ "key": "c/4", "duration": "3" }]"#),
            Err(ScoreError::Json(_))
        ));
        assert!(matches!(Score::new(0.0, vec![]), Err(ScoreError::Tempo(_))));
        assert!(matches!(
            Score::from_json(80.0, r#"[{ "key": "c/999999999", "duration": "q" }]"#),
            Err(ScoreError::Note(_))
        ));
    }

    #[test]
    fn default_exercise_loads() {
        let score = default_exercise().unwrap();
        assert_eq!(score.tempo, DEFAULT_TEMPO);
        assert_eq!(score.chords.len(), 12);
        assert_eq!(score.chords.iter().map(|c| c.notes.len()).sum::<usize>(), 18);
        assert!(score.chords.iter().flat_map(|c| &c.notes).all(|n| n.finger.is_some()));

        // 16 beats at 0.75 s each.
        assert!((score.total_length() - 12.0).abs() < 1e-9);
        let last = score.timeline()[11];
        assert!((last.start - 10.5).abs() < 1e-9);
        assert_eq!(last.chord.notes[2].note, n("B4"));
    }
}

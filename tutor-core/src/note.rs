//! # Note Identity Module
//!
//! Canonical note identifiers used everywhere in the tutor core.
//! A note is stored as its MIDI number so that enharmonic spellings
//! ("C#4" and "Db4") compare equal and collapse to one key.
//!
//! ## Features
//! - Parsing of keyboard-style names ("C4", "Db3", "C#3")
//! - Parsing of sheet-music style names ("c/4", "eb/5")
//! - Canonical flat spelling on output, matching the keyboard layout data
//! - Equal temperament frequencies (A4 = 440 Hz)

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::NoteParseError;

/// Pitch class names in canonical (flat) spelling, starting at C.
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Which pitch classes are black keys, starting at C.
const IS_BLACK: [bool; 12] = [
    false, true, false, true, false, false, true, false, true, false, true, false,
];

/// Equal temperament frequencies for every MIDI number, computed once.
static FREQUENCIES: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..128u32)
        .map(|midi| 440.0 * 2.0_f32.powf((midi as f32 - 69.0) / 12.0))
        .collect()
});

/// A canonical note identifier: pitch letter, optional accidental, octave.
///
/// Serialized as its canonical name, e.g. `"Db3"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteName(u8);

impl NoteName {
    pub const C3: NoteName = NoteName(48);

    /// Builds a note from its MIDI number (60 = C4).
    pub fn from_midi(midi: u8) -> Option<Self> {
        (midi < 128).then_some(Self(midi))
    }

    pub fn midi(self) -> u8 {
        self.0
    }

    /// Octave in scientific pitch notation (C4 is middle C).
    pub fn octave(self) -> i8 {
        (self.0 / 12) as i8 - 1
    }

    pub fn pitch_class(self) -> u8 {
        self.0 % 12
    }

    pub fn is_black(self) -> bool {
        IS_BLACK[self.pitch_class() as usize]
    }

    /// Equal temperament frequency in Hz.
    pub fn frequency(self) -> f32 {
        FREQUENCIES[self.0 as usize]
    }

    /// The next note up, if still a valid MIDI number.
    pub fn next(self) -> Option<Self> {
        Self::from_midi(self.0 + 1)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", FLAT_NAMES[self.pitch_class() as usize], self.octave())
    }
}

impl FromStr for NoteName {
    type Err = NoteParseError;

    /// Parses "C4", "Db3", "C#3", "c/4" and similar spellings.
    ///
    /// The letter is case-insensitive. Accidentals are `#` or `b`, and may
    /// be repeated. A single `/` between pitch and octave is accepted for
    /// sheet-music keys.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| NoteParseError {
            input: s.to_string(),
            reason,
        };

        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let letter = chars.next().ok_or_else(|| fail("empty note name"))?;
        let base: i32 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(fail("unknown pitch letter")),
        };

        let rest = chars.as_str().replace('/', "");
        let octave_start = rest
            .find(|c: char| c.is_ascii_digit() || c == '-')
            .ok_or_else(|| fail("missing octave"))?;
        let (accidentals, octave) = rest.split_at(octave_start);

        let mut shift = 0i32;
        for c in accidentals.chars() {
            match c {
                '#' => shift = shift.saturating_add(1),
                'b' | 'B' => shift = shift.saturating_sub(1),
                _ => return Err(fail("unknown accidental")),
            }
        }

        let octave: i32 = octave.parse().map_err(|_| fail("octave is not a number"))?;
        octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|m| m.checked_add(base))
            .and_then(|m| m.checked_add(shift))
            .and_then(|midi| u8::try_from(midi).ok())
            .and_then(NoteName::from_midi)
            .ok_or_else(|| fail("note is outside the MIDI range"))
    }
}

impl TryFrom<String> for NoteName {
    type Error = NoteParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NoteName> for String {
    fn from(note: NoteName) -> Self {
        note.to_string()
    }
}

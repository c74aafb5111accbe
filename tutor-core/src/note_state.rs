//! # Note State Machine Module
//!
//! Turns per-frame engaged sets into clean start/end edges.
//!
//! Each note is either silent or sounding. A note that appears in the
//! collapsed engaged set while silent starts; a sounding note missing from
//! the set ends. Holding a key produces nothing after its first frame, and
//! an empty frame ends everything, so a dropped frame can never leave a
//! note stuck on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::note::NoteName;
use crate::press::EngagedNote;

/// A single transition emitted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteEvent {
    /// Silent -> Sounding, with the current frame's attribution.
    Started(EngagedNote),
    /// Sounding -> Silent, with the previous frame's attribution.
    Ended(EngagedNote),
}

/// Events produced by one call to [`NoteStateMachine::advance`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteTransitions {
    pub started: Vec<EngagedNote>,
    pub ended: Vec<EngagedNote>,
}

impl NoteTransitions {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.ended.is_empty()
    }

    /// Flattens into a single list, ends before starts.
    pub fn into_events(self) -> Vec<NoteEvent> {
        self.ended
            .into_iter()
            .map(NoteEvent::Ended)
            .chain(self.started.into_iter().map(NoteEvent::Started))
            .collect()
    }
}

/// Diffs each frame's engaged notes against the previous frame.
///
/// The baseline holds at most one entry per note: when several fingers
/// press the same key, the first one found represents it.
#[derive(Debug, Clone, Default)]
pub struct NoteStateMachine {
    baseline: BTreeMap<NoteName, EngagedNote>,
}

impl NoteStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances one frame.
    ///
    /// This function:
    /// 1. Collapses `current` to one entry per note
    /// 2. Ends every baseline note missing from it
    /// 3. Starts every note missing from the baseline
    /// 4. Replaces the baseline with the collapsed set
    pub fn advance(&mut self, current: &[EngagedNote]) -> NoteTransitions {
        let mut collapsed: BTreeMap<NoteName, EngagedNote> = BTreeMap::new();
        for engaged in current {
            collapsed.entry(engaged.note).or_insert(*engaged);
        }

        let ended: Vec<EngagedNote> = self
            .baseline
            .iter()
            .filter(|(note, _)| !collapsed.contains_key(note))
            .map(|(_, previous)| *previous)
            .collect();

        let started: Vec<EngagedNote> = collapsed
            .iter()
            .filter(|(note, _)| !self.baseline.contains_key(note))
            .map(|(_, now)| *now)
            .collect();

        self.baseline = collapsed;

        if !started.is_empty() || !ended.is_empty() {
            debug!(
                started = started.len(),
                ended = ended.len(),
                sounding = self.baseline.len(),
                "note transitions"
            );
        }

        NoteTransitions { started, ended }
    }

    /// Ends every sounding note, e.g. when detection stops.
    pub fn release_all(&mut self) -> Vec<EngagedNote> {
        std::mem::take(&mut self.baseline).into_values().collect()
    }

    /// Currently sounding notes, lowest first. Read-only view for overlays.
    pub fn sounding(&self) -> impl Iterator<Item = &EngagedNote> {
        self.baseline.values()
    }

    pub fn sounding_count(&self) -> usize {
        self.baseline.len()
    }
}

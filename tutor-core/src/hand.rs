//! # Hand Observation Module
//!
//! Types describing what the external pose detector reports for each hand,
//! plus the fingertip conventions the rest of the engine relies on.
//!
//! Landmark indices follow the MediaPipe hand model: wrist is 0, then four
//! points per finger from the base outwards, so fingertips sit at 4, 8, 12,
//! 16 and 20.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of landmarks a well-formed hand carries.
pub const LANDMARK_COUNT: usize = 21;

/// Landmark index constants.
pub mod landmarks {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_TIP: usize = 16;
    pub const PINKY_TIP: usize = 20;
}

/// A 2D keypoint in video pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

/// A 3D keypoint. Only `z` is used by the engine: it is a unitless
/// engagement signal, larger when the point is pushed further toward the
/// camera.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Which hand a detection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// The opposite hand.
    pub fn mirrored(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }

    /// Converts a detector label into the label the user would give.
    ///
    /// The video is shown flipped (selfie view), so what the detector calls
    /// "Left" is the user's right hand whenever `mirrored_video` is set.
    /// This is the only place the flip is applied.
    pub fn user_perspective(self, mirrored_video: bool) -> Self {
        if mirrored_video { self.mirrored() } else { self }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Left => f.write_str("Left"),
            Handedness::Right => f.write_str("Right"),
        }
    }
}

/// The five fingers, numbered 1 (thumb) to 5 (pinky) as in piano fingering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Landmark index of this finger's tip.
    pub fn tip_index(self) -> usize {
        match self {
            Finger::Thumb => landmarks::THUMB_TIP,
            Finger::Index => landmarks::INDEX_TIP,
            Finger::Middle => landmarks::MIDDLE_TIP,
            Finger::Ring => landmarks::RING_TIP,
            Finger::Pinky => landmarks::PINKY_TIP,
        }
    }

    /// Piano fingering number, thumb = 1 through pinky = 5.
    pub fn number(self) -> u8 {
        match self {
            Finger::Thumb => 1,
            Finger::Index => 2,
            Finger::Middle => 3,
            Finger::Ring => 4,
            Finger::Pinky => 5,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Finger::ALL.get(usize::from(number).checked_sub(1)?).copied()
    }
}

/// One hand as reported by the pose detector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    /// Handedness as reported by the detector, before mirror correction.
    pub handedness: Handedness,
    /// 2D keypoints in video pixel space.
    pub keypoints: Vec<Keypoint>,
    /// Parallel 3D keypoints carrying the depth signal.
    pub keypoints_3d: Vec<Keypoint3D>,
}

impl HandObservation {
    /// Pixel position and depth of one landmark, if the detector supplied
    /// both for this index.
    pub fn landmark(&self, index: usize) -> Option<(Keypoint, f32)> {
        let point = self.keypoints.get(index)?;
        let depth = self.keypoints_3d.get(index)?;
        Some((*point, depth.z))
    }

    /// A hand is well formed when it carries the full landmark set in
    /// both coordinate spaces.
    pub fn is_well_formed(&self) -> bool {
        self.keypoints.len() == LANDMARK_COUNT && self.keypoints_3d.len() == LANDMARK_COUNT
    }
}

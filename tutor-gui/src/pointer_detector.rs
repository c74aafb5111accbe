//! # Pointer Hand Detector
//!
//! A stand-in for the camera hand-pose model. The mouse pointer is the
//! right index fingertip; holding the left button pushes that fingertip
//! past its press threshold. The other fingers hover above the keys.

use tutor_core::detection::PoseDetector;
use tutor_core::error::DetectorError;
use tutor_core::hand::{Finger, HandObservation, Handedness, Keypoint, Keypoint3D, LANDMARK_COUNT, landmarks};
use tutor_core::keyboard::Point;

/// Depth reported for the index fingertip while the button is held.
pub const PRESSED_DEPTH: f32 = 0.1;

/// Where the non-index fingertips sit relative to the pointer.
const HOVER_OFFSETS: [(Finger, f32, f32); 4] = [
    (Finger::Thumb, -40.0, 30.0),
    (Finger::Middle, 18.0, -90.0),
    (Finger::Ring, 36.0, -85.0),
    (Finger::Pinky, 54.0, -75.0),
];

/// One "video frame": the pointer state when the frame was taken.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerFrame {
    pub position: Option<Point>,
    pub pressed: bool,
}

#[derive(Debug, Default)]
pub struct PointerDetector {
    /// Whether to label the hand the way a mirrored camera would.
    mirrored_video: bool,
}

impl PointerDetector {
    pub fn new(mirrored_video: bool) -> Self {
        Self { mirrored_video }
    }

    fn observe(&self, at: Point, pressed: bool) -> HandObservation {
        let mut keypoints = vec![Keypoint { x: at.x, y: at.y + 120.0 }; LANDMARK_COUNT];
        let mut keypoints_3d = vec![Keypoint3D::default(); LANDMARK_COUNT];

        let mut place = |index: usize, x: f32, y: f32, z: f32| {
            keypoints[index] = Keypoint { x, y };
            keypoints_3d[index] = Keypoint3D { x, y, z };
        };

        place(landmarks::WRIST, at.x + 10.0, at.y + 140.0, 0.0);
        place(
            Finger::Index.tip_index(),
            at.x,
            at.y,
            if pressed { PRESSED_DEPTH } else { 0.0 },
        );
        for (finger, dx, dy) in HOVER_OFFSETS {
            place(finger.tip_index(), at.x + dx, at.y + dy, 0.0);
        }

        // A mirrored camera reports the user's right hand as Left.
        let handedness = Handedness::Right.user_perspective(self.mirrored_video);
        HandObservation {
            handedness,
            keypoints,
            keypoints_3d,
        }
    }
}

impl PoseDetector for PointerDetector {
    type Frame = PointerFrame;

    fn estimate_hands(&mut self, frame: &PointerFrame) -> Result<Vec<HandObservation>, DetectorError> {
        Ok(frame
            .position
            .map(|at| vec![self.observe(at, frame.pressed)])
            .unwrap_or_default())
    }
}

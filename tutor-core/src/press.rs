//! # Press Detection Module
//!
//! Turns smoothed hands into the set of keys being pressed this frame.
//!
//! For every hand the five fingertips are hit-tested against the keyboard.
//! A fingertip over a key only counts as pressing it when its depth signal
//! is above that finger's threshold; otherwise it is hovering. Duplicate
//! notes (two fingers on one key) are kept here and collapsed later by the
//! note state machine.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EngineConfig, FingerThresholds};
use crate::hand::{Finger, HandObservation, Handedness};
use crate::keyboard::{KeyboardLayout, Point};
use crate::note::NoteName;

/// A fingertip pressing a key, attributed to a hand and finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagedNote {
    pub note: NoteName,
    pub finger: Finger,
    /// Hand from the user's point of view, after mirror correction.
    pub hand: Handedness,
}

impl EngagedNote {
    /// Piano fingering number, 1 (thumb) to 5 (pinky).
    pub fn finger_number(&self) -> u8 {
        self.finger.number()
    }
}

/// Position and depth of one fingertip in a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fingertip {
    pub finger: Finger,
    pub position: Point,
    pub depth: f32,
}

/// Extracts the fingertips a hand actually carries.
///
/// Fingertips with missing or non-finite data are left out, so a partly
/// malformed hand still contributes its good fingers.
pub fn fingertips(hand: &HandObservation) -> Vec<Fingertip> {
    Finger::ALL
        .iter()
        .filter_map(|&finger| {
            let (point, depth) = hand.landmark(finger.tip_index())?;
            if !(point.x.is_finite() && point.y.is_finite() && depth.is_finite()) {
                return None;
            }
            Some(Fingertip {
                finger,
                position: Point::from(point),
                depth,
            })
        })
        .collect()
}

/// Decides which keys are engaged in a frame.
#[derive(Debug, Clone)]
pub struct PressDetector {
    thresholds: FingerThresholds,
    mirrored_video: bool,
}

impl PressDetector {
    pub fn new(thresholds: FingerThresholds, mirrored_video: bool) -> Self {
        Self {
            thresholds,
            mirrored_video,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.thresholds, config.mirrored_video)
    }

    pub fn thresholds(&self) -> &FingerThresholds {
        &self.thresholds
    }

    /// Returns true when `tip` presses hard enough for its finger.
    pub fn is_pressing(&self, tip: &Fingertip) -> bool {
        tip.depth > self.thresholds.for_finger(tip.finger)
    }

    /// Finds every engaged (note, finger, hand) in this frame.
    ///
    /// # Arguments
    /// * `hands` - Smoothed hands for this frame
    /// * `layout` - The keyboard to hit-test against
    ///
    /// # Returns
    /// * All engaged notes, possibly with the same note more than once
    pub fn detect(&self, hands: &[HandObservation], layout: &KeyboardLayout) -> Vec<EngagedNote> {
        let mut engaged = Vec::new();

        for hand in hands {
            if !hand.is_well_formed() {
                debug!(
                    keypoints = hand.keypoints.len(),
                    keypoints_3d = hand.keypoints_3d.len(),
                    "malformed hand, using whatever fingertips are present"
                );
            }

            let user_hand = hand.handedness.user_perspective(self.mirrored_video);
            for tip in fingertips(hand) {
                let Some(region) = layout.locate(tip.position) else {
                    continue;
                };
                if self.is_pressing(&tip) {
                    engaged.push(EngagedNote {
                        note: region.note,
                        finger: tip.finger,
                        hand: user_hand,
                    });
                }
            }
        }

        engaged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{Keypoint, Keypoint3D};
    use crate::keyboard::LayoutSpec;

    fn layout() -> KeyboardLayout {
        KeyboardLayout::from_spec(&LayoutSpec::default()).unwrap()
    }

    /// A hand far from the keyboard with one fingertip moved onto `at`.
    fn hand_with_tip(handedness: Handedness, finger: Finger, at: Point, depth: f32) -> HandObservation {
        let mut keypoints = vec![Keypoint { x: -100.0, y: -100.0 }; 21];
        let mut keypoints_3d = vec![Keypoint3D::default(); 21];
        keypoints[finger.tip_index()] = Keypoint { x: at.x, y: at.y };
        keypoints_3d[finger.tip_index()].z = depth;
        HandObservation {
            handedness,
            keypoints,
            keypoints_3d,
        }
    }

    fn centre_of(layout: &KeyboardLayout, note: &str) -> Point {
        layout.region(note.parse().unwrap()).unwrap().centroid()
    }

    #[test]
    fn pressing_fingertip_engages_key_with_mirrored_hand() {
        let layout = layout();
        let detector = PressDetector::from_config(&EngineConfig::default());
        let hand = hand_with_tip(Handedness::Left, Finger::Index, centre_of(&layout, "E4"), 0.1);

        let engaged = detector.detect(&[hand], &layout);
        assert_eq!(
            engaged,
            vec![EngagedNote {
                note: "E4".parse().unwrap(),
                finger: Finger::Index,
                hand: Handedness::Right,
            }]
        );
        assert_eq!(engaged[0].finger_number(), 2);
    }

    #[test]
    fn hovering_fingertip_is_ignored_until_depth_rises() {
        let layout = layout();
        let detector = PressDetector::from_config(&EngineConfig::default());
        let at = centre_of(&layout, "G3");

        let hovering = hand_with_tip(Handedness::Right, Finger::Middle, at, 0.03);
        assert!(detector.detect(&[hovering], &layout).is_empty());

        let pressing = hand_with_tip(Handedness::Right, Finger::Middle, at, 0.05);
        assert_eq!(detector.detect(&[pressing], &layout).len(), 1);
    }

    #[test]
    fn thresholds_are_per_finger() {
        let layout = layout();
        let detector = PressDetector::from_config(&EngineConfig::default());
        let at = centre_of(&layout, "C4");

        // 0.055 clears the middle finger (0.045) but not the thumb (0.060).
        let middle = hand_with_tip(Handedness::Right, Finger::Middle, at, 0.055);
        let thumb = hand_with_tip(Handedness::Right, Finger::Thumb, at, 0.055);
        assert_eq!(detector.detect(&[middle], &layout).len(), 1);
        assert!(detector.detect(&[thumb], &layout).is_empty());
    }

    #[test]
    fn fingertip_outside_the_keyboard_is_a_miss() {
        let layout = layout();
        let detector = PressDetector::from_config(&EngineConfig::default());
        let hand = hand_with_tip(Handedness::Right, Finger::Index, Point::new(320.0, 50.0), 0.5);
        assert!(detector.detect(&[hand], &layout).is_empty());
    }

    #[test]
    fn duplicate_notes_are_kept() {
        let layout = layout();
        let detector = PressDetector::from_config(&EngineConfig::default());
        let at = centre_of(&layout, "D4");
        let left = hand_with_tip(Handedness::Left, Finger::Index, at, 0.2);
        let right = hand_with_tip(Handedness::Right, Finger::Ring, at, 0.2);
        assert_eq!(detector.detect(&[left, right], &layout).len(), 2);
    }

    #[test]
    fn malformed_hands_skip_missing_fingertips() {
        let layout = layout();
        let detector = PressDetector::from_config(&EngineConfig::default());
        let mut hand = hand_with_tip(Handedness::Right, Finger::Index, centre_of(&layout, "D4"), 0.2);
        hand.keypoints_3d.truncate(5);
        assert!(detector.detect(&[hand.clone()], &layout).is_empty());

        hand.keypoints.clear();
        assert!(detector.detect(&[hand], &layout).is_empty());

        let mut nan = hand_with_tip(Handedness::Right, Finger::Index, centre_of(&layout, "D4"), 0.2);
        nan.keypoints[8].x = f32::NAN;
        assert!(fingertips(&nan).iter().all(|t| t.finger != Finger::Index));
    }

    #[test]
    fn unmirrored_video_keeps_detector_label() {
        let layout = layout();
        let detector = PressDetector::new(FingerThresholds::default(), false);
        let hand = hand_with_tip(Handedness::Left, Finger::Pinky, centre_of(&layout, "A3"), 0.2);
        assert_eq!(detector.detect(&[hand], &layout)[0].hand, Handedness::Left);
    }
}

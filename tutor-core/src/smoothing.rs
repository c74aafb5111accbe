//! # Landmark Smoothing Module
//!
//! Exponential smoothing of detector keypoints, per hand slot, to take the
//! jitter out of the raw landmark stream before hit testing.
//!
//! A hand slot is identified by the detector's handedness label plus the
//! hand's position in that frame's output. Slots that stop appearing are
//! forgotten immediately; a hand that comes back starts fresh.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::hand::{Handedness, HandObservation, Keypoint};

/// Identity used to correlate one hand across consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandSlot {
    pub handedness: Handedness,
    pub ordinal: usize,
}

/// Smoothed state of one landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SmoothedPoint {
    x: f32,
    y: f32,
    depth: Option<f32>,
}

impl SmoothedPoint {
    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.depth.is_none_or(f32::is_finite)
    }

    fn blend(self, raw: SmoothedPoint, alpha: f32) -> SmoothedPoint {
        let mix = |prev: f32, new: f32| prev * alpha + new * (1.0 - alpha);
        SmoothedPoint {
            x: mix(self.x, raw.x),
            y: mix(self.y, raw.y),
            depth: match (self.depth, raw.depth) {
                (Some(prev), Some(new)) => Some(mix(prev, new)),
                (_, new) => new,
            },
        }
    }
}

/// Exponential moving average over hand landmarks.
///
/// Each coordinate is updated as `previous * alpha + raw * (1 - alpha)`,
/// so a lower `alpha` follows the hand more closely.
#[derive(Debug, Clone)]
pub struct LandmarkSmoother {
    alpha: f32,
    slots: HashMap<HandSlot, Vec<SmoothedPoint>>,
}

impl LandmarkSmoother {
    /// # Arguments
    /// * `alpha` - Weight of the previous value, clamped to `[0, 1]`
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            slots: HashMap::new(),
        }
    }

    /// Number of hand slots currently tracked.
    pub fn tracked_slots(&self) -> usize {
        self.slots.len()
    }

    /// Forgets all hand history.
    pub fn reset(&mut self) {
        self.slots.clear();
    }

    /// Smooths one frame of detector output.
    ///
    /// This function:
    /// 1. Passes a slot's first sample through unchanged and remembers it
    /// 2. Blends every later sample with the remembered state
    /// 3. Drops the state of every slot missing from this frame
    ///
    /// # Arguments
    /// * `raw_hands` - Hands as reported by the detector for this frame
    ///
    /// # Returns
    /// * The same hands, in the same order, with smoothed coordinates
    pub fn smooth(&mut self, raw_hands: &[HandObservation]) -> Vec<HandObservation> {
        let mut seen = HashSet::with_capacity(raw_hands.len());
        let mut smoothed_hands = Vec::with_capacity(raw_hands.len());

        for (ordinal, hand) in raw_hands.iter().enumerate() {
            let slot = HandSlot {
                handedness: hand.handedness,
                ordinal,
            };
            seen.insert(slot);

            let raw_points: Vec<SmoothedPoint> = hand
                .keypoints
                .iter()
                .enumerate()
                .map(|(i, k)| SmoothedPoint {
                    x: k.x,
                    y: k.y,
                    depth: hand.keypoints_3d.get(i).map(|p| p.z),
                })
                .collect();

            let previous = match self.slots.get(&slot) {
                Some(previous) if previous.len() == raw_points.len() => Some(previous),
                Some(_) => {
                    debug!(?slot, "landmark count changed, restarting smoothing");
                    None
                }
                None => {
                    debug!(?slot, "new hand slot");
                    None
                }
            };

            // Non-finite samples are passed out as-is, so this frame skips
            // them, but never enter the stored state.
            let mut stored = Vec::with_capacity(raw_points.len());
            let mut emitted = Vec::with_capacity(raw_points.len());
            let mut rejected = 0usize;
            for (i, raw) in raw_points.iter().enumerate() {
                let prev = previous.map(|points| points[i]);
                if !raw.is_finite() {
                    rejected += 1;
                    stored.push(prev.unwrap_or(*raw));
                    emitted.push(*raw);
                    continue;
                }
                let next = match prev {
                    Some(prev) if prev.is_finite() => prev.blend(*raw, self.alpha),
                    _ => *raw,
                };
                stored.push(next);
                emitted.push(next);
            }
            if rejected > 0 {
                debug!(?slot, rejected, "non-finite landmarks skipped for this frame");
            }

            smoothed_hands.push(rebuild(hand, &emitted));
            self.slots.insert(slot, stored);
        }

        let before = self.slots.len();
        self.slots.retain(|slot, _| seen.contains(slot));
        if self.slots.len() < before {
            debug!(evicted = before - self.slots.len(), "hand slots evicted");
        }

        smoothed_hands
    }
}

/// Writes smoothed values back into the shape of the raw observation.
fn rebuild(raw: &HandObservation, points: &[SmoothedPoint]) -> HandObservation {
    let keypoints = points.iter().map(|p| Keypoint { x: p.x, y: p.y }).collect();
    let keypoints_3d = raw
        .keypoints_3d
        .iter()
        .enumerate()
        .map(|(i, k)| {
            let mut k = *k;
            if let Some(depth) = points.get(i).and_then(|p| p.depth) {
                k.z = depth;
            }
            k
        })
        .collect();

    HandObservation {
        handedness: raw.handedness,
        keypoints,
        keypoints_3d,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::Keypoint3D;

    fn hand(handedness: Handedness, x: f32, y: f32, z: f32) -> HandObservation {
        HandObservation {
            handedness,
            keypoints: vec![Keypoint { x, y }; 21],
            keypoints_3d: vec![Keypoint3D { x: 0.0, y: 0.0, z }; 21],
        }
    }

    #[test]
    fn first_sample_passes_through() {
        let mut smoother = LandmarkSmoother::new(0.4);
        let raw = vec![hand(Handedness::Left, 100.0, 200.0, 0.1)];
        assert_eq!(smoother.smooth(&raw), raw);
        assert_eq!(smoother.tracked_slots(), 1);
    }

    #[test]
    fn later_samples_are_blended() {
        let mut smoother = LandmarkSmoother::new(0.4);
        smoother.smooth(&[hand(Handedness::Left, 100.0, 0.0, 0.0)]);
        let out = smoother.smooth(&[hand(Handedness::Left, 200.0, 10.0, 1.0)]);

        // 100 * 0.4 + 200 * 0.6
        assert!((out[0].keypoints[8].x - 160.0).abs() < 1e-4);
        assert!((out[0].keypoints[8].y - 6.0).abs() < 1e-4);
        assert!((out[0].keypoints_3d[8].z - 0.6).abs() < 1e-4);
    }

    #[test]
    fn missing_slots_are_evicted_immediately() {
        let mut smoother = LandmarkSmoother::new(0.4);
        smoother.smooth(&[
            hand(Handedness::Left, 0.0, 0.0, 0.0),
            hand(Handedness::Right, 50.0, 0.0, 0.0),
        ]);
        assert_eq!(smoother.tracked_slots(), 2);

        smoother.smooth(&[hand(Handedness::Left, 0.0, 0.0, 0.0)]);
        assert_eq!(smoother.tracked_slots(), 1);

        // The right hand comes back and is treated as a first sample.
        let out = smoother.smooth(&[
            hand(Handedness::Left, 0.0, 0.0, 0.0),
            hand(Handedness::Right, 300.0, 0.0, 0.0),
        ]);
        assert_eq!(out[1].keypoints[0].x, 300.0);
    }

    #[test]
    fn empty_frame_returns_no_hands_and_clears_state() {
        let mut smoother = LandmarkSmoother::new(0.4);
        smoother.smooth(&[hand(Handedness::Right, 1.0, 1.0, 0.0)]);
        assert!(smoother.smooth(&[]).is_empty());
        assert_eq!(smoother.tracked_slots(), 0);
    }

    #[test]
    fn constant_input_converges_monotonically() {
        let mut smoother = LandmarkSmoother::new(0.4);
        smoother.smooth(&[hand(Handedness::Right, 0.0, 0.0, 0.0)]);

        let target = hand(Handedness::Right, 100.0, 50.0, 0.2);
        let mut last_distance = f32::INFINITY;
        for _ in 0..15 {
            let out = smoother.smooth(std::slice::from_ref(&target));
            let p = out[0].keypoints[4];
            let distance = ((p.x - 100.0).powi(2) + (p.y - 50.0).powi(2)).sqrt();
            assert!(distance < last_distance || distance == 0.0);
            last_distance = distance;
        }
        assert!(last_distance < 0.1);
    }

    #[test]
    fn non_finite_sample_is_skipped_for_one_frame_only() {
        let mut smoother = LandmarkSmoother::new(0.4);
        smoother.smooth(&[hand(Handedness::Right, 100.0, 100.0, 0.1)]);

        let mut bad = hand(Handedness::Right, 100.0, 100.0, 0.1);
        bad.keypoints[8].x = f32::NAN;
        bad.keypoints_3d[12].z = f32::INFINITY;
        let out = smoother.smooth(&[bad]);
        assert!(out[0].keypoints[8].x.is_nan());
        assert!(out[0].keypoints_3d[12].z.is_infinite());
        assert!((out[0].keypoints[4].x - 100.0).abs() < 1e-4);

        // The next good frame blends with the last good state.
        let out = smoother.smooth(&[hand(Handedness::Right, 200.0, 100.0, 0.1)]);
        assert!((out[0].keypoints[8].x - 160.0).abs() < 1e-4);
        assert!((out[0].keypoints_3d[12].z - 0.1).abs() < 1e-6);
    }

    #[test]
    fn non_finite_first_sample_is_reseeded() {
        let mut smoother = LandmarkSmoother::new(0.4);
        let mut bad = hand(Handedness::Left, 10.0, 10.0, 0.0);
        bad.keypoints[8].y = f32::NAN;
        smoother.smooth(&[bad]);

        let out = smoother.smooth(&[hand(Handedness::Left, 50.0, 20.0, 0.0)]);
        assert_eq!(out[0].keypoints[8].y, 20.0);
        assert_eq!(out[0].keypoints[8].x, 50.0);
    }

    #[test]
    fn changed_landmark_count_restarts_the_slot() {
        let mut smoother = LandmarkSmoother::new(0.4);
        smoother.smooth(&[hand(Handedness::Left, 0.0, 0.0, 0.0)]);
        let mut short = hand(Handedness::Left, 90.0, 0.0, 0.0);
        short.keypoints.truncate(5);
        let out = smoother.smooth(&[short]);
        assert_eq!(out[0].keypoints.len(), 5);
        assert_eq!(out[0].keypoints[0].x, 90.0);
    }
}

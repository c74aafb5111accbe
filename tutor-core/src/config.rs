//! # Engine Configuration Module
//!
//! Every tunable number the detection engine uses, with the defaults it
//! was calibrated with. The values were tuned empirically against a
//! webcam at typical desk distance; recalibrating means editing the JSON
//! file, not the control flow.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::hand::Finger;
use crate::keyboard::LayoutSpec;

/// Weight of the previous smoothed value in the landmark filter.
///
/// Lower than a typical jitter filter would use: input latency hurts the
/// tutoring experience more than a little jitter does.
pub const DEFAULT_SMOOTHING_ALPHA: f32 = 0.4;

/// Depth thresholds per finger. Fingers reach different apparent depths
/// when pressing a flat virtual surface seen at an angle.
pub const DEFAULT_THUMB_THRESHOLD: f32 = 0.060;
pub const DEFAULT_INDEX_THRESHOLD: f32 = 0.050;
pub const DEFAULT_MIDDLE_THRESHOLD: f32 = 0.045;
pub const DEFAULT_RING_THRESHOLD: f32 = 0.050;
pub const DEFAULT_PINKY_THRESHOLD: f32 = 0.055;

/// Minimum depth signal for each fingertip to count as pressing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerThresholds {
    pub thumb: f32,
    pub index: f32,
    pub middle: f32,
    pub ring: f32,
    pub pinky: f32,
}

impl Default for FingerThresholds {
    fn default() -> Self {
        Self {
            thumb: DEFAULT_THUMB_THRESHOLD,
            index: DEFAULT_INDEX_THRESHOLD,
            middle: DEFAULT_MIDDLE_THRESHOLD,
            ring: DEFAULT_RING_THRESHOLD,
            pinky: DEFAULT_PINKY_THRESHOLD,
        }
    }
}

impl FingerThresholds {
    pub fn for_finger(&self, finger: Finger) -> f32 {
        match finger {
            Finger::Thumb => self.thumb,
            Finger::Index => self.index,
            Finger::Middle => self.middle,
            Finger::Ring => self.ring,
            Finger::Pinky => self.pinky,
        }
    }
}

/// Complete configuration of the detection engine.
///
/// Missing fields in a config file fall back to their defaults, so a file
/// containing only `{"smoothing_alpha": 0.5}` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub smoothing_alpha: f32,
    pub thresholds: FingerThresholds,
    /// The video is shown horizontally flipped (selfie view).
    pub mirrored_video: bool,
    pub layout: LayoutSpec,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: DEFAULT_SMOOTHING_ALPHA,
            thresholds: FingerThresholds::default(),
            mirrored_video: true,
            layout: LayoutSpec::default(),
        }
    }
}

impl EngineConfig {
    /// Loads and validates a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.smoothing_alpha) {
            return Err(ConfigError::Invalid(format!(
                "smoothing_alpha must be in [0, 1), got {}",
                self.smoothing_alpha
            )));
        }
        for finger in Finger::ALL {
            let threshold = self.thresholds.for_finger(finger);
            if !threshold.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "threshold for {:?} is not a number",
                    finger
                )));
            }
        }
        Ok(())
    }
}

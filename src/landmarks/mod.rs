//! Hand landmark data model shared by capture, storage, and classification.
//!
//! The layout mirrors the upstream pose estimator: 21 keypoints per hand in a
//! fixed order, wrist first. Frames keep one optional slot per handedness so
//! "no hand visible this tick" stays a first-class observation instead of a
//! dropped frame.

use serde::{Deserialize, Serialize};

mod features;
mod normalize;
mod resample;

pub use features::{FrameFeatures, feature_sequence, frame_features};
pub use normalize::{normalize_frame, normalize_hand};
pub use resample::resample_frames;

/// Keypoints delivered per hand by the pose estimator.
pub const NUM_KEYPOINTS: usize = 21;
/// Index of the wrist keypoint used as the normalization origin.
pub const WRIST: usize = 0;
/// Components per keypoint (x, y, z).
pub const COORDS_PER_KEYPOINT: usize = 3;
/// Flattened feature width for one hand.
pub const FEATURES_PER_HAND: usize = NUM_KEYPOINTS * COORDS_PER_KEYPOINT;

/// One normalized keypoint as `[x, y, z]`.
pub type Keypoint = [f32; COORDS_PER_KEYPOINT];

/// All 21 normalized keypoints of one hand.
pub type HandPoints = [Keypoint; NUM_KEYPOINTS];

/// Which hand an observation belongs to, as labeled by the pose estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

/// A raw keypoint as delivered by the pose estimator; `z` is optional because
/// some runtimes omit depth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RawKeypoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: Option<f32>,
}

/// One raw hand observation: a handedness label plus the estimator's
/// keypoints in camera coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHandObservation {
    pub handedness: Handedness,
    pub keypoints: Vec<RawKeypoint>,
}

/// One normalized frame of the sequence data model.
///
/// A hand slot is `None` when that hand was not visible on the tick. A frame
/// with both slots empty is valid and preserved, keeping timing alignment
/// across the sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub left_hand: Option<HandPoints>,
    pub right_hand: Option<HandPoints>,
}

impl LandmarkFrame {
    /// Whether at least one hand was visible on this tick.
    pub fn has_any_hand(&self) -> bool {
        self.left_hand.is_some() || self.right_hand.is_some()
    }
}

//! Per-frame feature extraction for the distance engine.
//!
//! Each hand flattens to a 63-float block. Presence is kept alongside the
//! block instead of zero-filling so the DTW local cost can distinguish "hand
//! absent" from "hand at the wrist origin".

use super::{FEATURES_PER_HAND, HandPoints, LandmarkFrame};

/// Flattened per-hand feature blocks for one frame.
#[derive(Debug, Clone)]
pub struct FrameFeatures {
    pub left: Option<[f32; FEATURES_PER_HAND]>,
    pub right: Option<[f32; FEATURES_PER_HAND]>,
}

impl FrameFeatures {
    /// Whether the frame carried at least one hand.
    pub fn has_any_hand(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }
}

fn flatten(points: &HandPoints) -> [f32; FEATURES_PER_HAND] {
    let mut block = [0.0_f32; FEATURES_PER_HAND];
    for (idx, point) in points.iter().enumerate() {
        block[idx * 3] = point[0];
        block[idx * 3 + 1] = point[1];
        block[idx * 3 + 2] = point[2];
    }
    block
}

/// Extract the feature blocks of one frame.
pub fn frame_features(frame: &LandmarkFrame) -> FrameFeatures {
    FrameFeatures {
        left: frame.left_hand.as_ref().map(flatten),
        right: frame.right_hand.as_ref().map(flatten),
    }
}

/// Extract feature blocks for a whole sequence, preserving frame order.
pub fn feature_sequence(frames: &[LandmarkFrame]) -> Vec<FrameFeatures> {
    frames.iter().map(frame_features).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::NUM_KEYPOINTS;

    #[test]
    fn flatten_preserves_keypoint_order() {
        let mut points = [[0.0_f32; 3]; NUM_KEYPOINTS];
        points[1] = [1.0, 2.0, 3.0];
        points[20] = [-0.5, 0.5, 0.0];
        let frame = LandmarkFrame {
            left_hand: Some(points),
            right_hand: None,
        };
        let features = frame_features(&frame);
        let left = features.left.unwrap();
        assert_eq!(&left[3..6], &[1.0, 2.0, 3.0]);
        assert_eq!(&left[60..63], &[-0.5, 0.5, 0.0]);
        assert!(features.right.is_none());
    }

    #[test]
    fn empty_frame_has_no_blocks() {
        let features = frame_features(&LandmarkFrame::default());
        assert!(!features.has_any_hand());
    }

    #[test]
    fn sequence_extraction_keeps_length() {
        let frames = vec![LandmarkFrame::default(); 7];
        assert_eq!(feature_sequence(&frames).len(), 7);
    }
}

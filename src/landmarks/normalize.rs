//! Wrist-relative landmark normalization.
//!
//! Keypoints are translated so the wrist sits at the origin, then divided by
//! a fixed factor of 100 to bring camera-pixel coordinates into a small
//! numeric range. This makes the representation invariant to where the hand
//! sits in the camera frame but *not* to hand size or rotation; that is a
//! deliberate, documented limitation of the representation, not a defect.

use super::{
    HandPoints, Handedness, LandmarkFrame, NUM_KEYPOINTS, RawHandObservation, WRIST,
};

const TRANSLATION_SCALE: f32 = 100.0;

/// Normalize one raw hand observation into wrist-relative keypoints.
///
/// Returns `None` when the estimator delivered fewer than 21 keypoints; a
/// truncated hand is treated as not observed rather than padded with
/// fabricated coordinates. Extra keypoints beyond 21 are ignored.
pub fn normalize_hand(observation: &RawHandObservation) -> Option<HandPoints> {
    if observation.keypoints.len() < NUM_KEYPOINTS {
        return None;
    }
    let wrist = observation.keypoints[WRIST];
    let mut points = [[0.0_f32; 3]; NUM_KEYPOINTS];
    for (slot, keypoint) in points.iter_mut().zip(observation.keypoints.iter()) {
        *slot = [
            (keypoint.x - wrist.x) / TRANSLATION_SCALE,
            (keypoint.y - wrist.y) / TRANSLATION_SCALE,
            keypoint.z.unwrap_or(0.0),
        ];
    }
    Some(points)
}

/// Normalize all hands observed on one tick into a `LandmarkFrame`.
///
/// When the estimator reports the same handedness more than once, the last
/// successfully normalized observation wins; a truncated observation never
/// overwrites a good one.
pub fn normalize_frame(hands: &[RawHandObservation]) -> LandmarkFrame {
    let mut frame = LandmarkFrame::default();
    for hand in hands {
        let normalized = normalize_hand(hand);
        match hand.handedness {
            Handedness::Left => frame.left_hand = normalized.or(frame.left_hand),
            Handedness::Right => frame.right_hand = normalized.or(frame.right_hand),
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::RawKeypoint;

    fn observation(handedness: Handedness, origin: (f32, f32)) -> RawHandObservation {
        let keypoints = (0..NUM_KEYPOINTS)
            .map(|idx| RawKeypoint {
                x: origin.0 + idx as f32,
                y: origin.1 + idx as f32 * 2.0,
                z: Some(idx as f32 * 0.01),
            })
            .collect();
        RawHandObservation {
            handedness,
            keypoints,
        }
    }

    #[test]
    fn wrist_lands_at_origin() {
        let points = normalize_hand(&observation(Handedness::Right, (320.0, 240.0))).unwrap();
        assert_eq!(points[WRIST][0], 0.0);
        assert_eq!(points[WRIST][1], 0.0);
    }

    #[test]
    fn normalization_is_translation_invariant() {
        let near = normalize_hand(&observation(Handedness::Right, (10.0, 10.0))).unwrap();
        let far = normalize_hand(&observation(Handedness::Right, (610.0, 410.0))).unwrap();
        for (a, b) in near.iter().zip(far.iter()) {
            assert!((a[0] - b[0]).abs() < 1e-6);
            assert!((a[1] - b[1]).abs() < 1e-6);
        }
    }

    #[test]
    fn missing_depth_becomes_zero() {
        let mut raw = observation(Handedness::Left, (0.0, 0.0));
        for keypoint in &mut raw.keypoints {
            keypoint.z = None;
        }
        let points = normalize_hand(&raw).unwrap();
        assert!(points.iter().all(|point| point[2] == 0.0));
    }

    #[test]
    fn truncated_hand_is_rejected() {
        let mut raw = observation(Handedness::Left, (0.0, 0.0));
        raw.keypoints.truncate(5);
        assert!(normalize_hand(&raw).is_none());
    }

    #[test]
    fn frame_routes_hands_by_handedness() {
        let frame = normalize_frame(&[
            observation(Handedness::Left, (50.0, 60.0)),
            observation(Handedness::Right, (400.0, 60.0)),
        ]);
        assert!(frame.left_hand.is_some());
        assert!(frame.right_hand.is_some());
    }

    #[test]
    fn no_hands_yields_empty_frame() {
        let frame = normalize_frame(&[]);
        assert!(!frame.has_any_hand());
    }
}

//! Linear-interpolation resampling to a fixed frame count.
//!
//! Export and visualization consumers want fixed-length sequences; the
//! persisted training path never does, because DTW is length-tolerant. Do
//! not route stored sequences through this before training or classification.

use super::{HandPoints, LandmarkFrame, NUM_KEYPOINTS};

/// Resample a sequence to exactly `target` frames by linear interpolation
/// over the frame index axis.
///
/// A hand is interpolated pointwise when both bracketing frames carry it;
/// otherwise the nearer frame's slot (possibly `None`) is taken, so missing
/// hands stay missing instead of being invented.
pub fn resample_frames(frames: &[LandmarkFrame], target: usize) -> Vec<LandmarkFrame> {
    if frames.is_empty() || target == 0 {
        return Vec::new();
    }
    if frames.len() == 1 || target == 1 {
        return vec![frames[0].clone(); target];
    }

    let span = (frames.len() - 1) as f32;
    let step = span / (target - 1) as f32;
    (0..target)
        .map(|idx| {
            let position = idx as f32 * step;
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(frames.len() - 1);
            let t = position - lower as f32;
            LandmarkFrame {
                left_hand: lerp_hand(
                    frames[lower].left_hand.as_ref(),
                    frames[upper].left_hand.as_ref(),
                    t,
                ),
                right_hand: lerp_hand(
                    frames[lower].right_hand.as_ref(),
                    frames[upper].right_hand.as_ref(),
                    t,
                ),
            }
        })
        .collect()
}

fn lerp_hand(lower: Option<&HandPoints>, upper: Option<&HandPoints>, t: f32) -> Option<HandPoints> {
    match (lower, upper) {
        (Some(a), Some(b)) => {
            let mut points = [[0.0_f32; 3]; NUM_KEYPOINTS];
            for (slot, (pa, pb)) in points.iter_mut().zip(a.iter().zip(b.iter())) {
                for axis in 0..3 {
                    slot[axis] = pa[axis] + (pb[axis] - pa[axis]) * t;
                }
            }
            Some(points)
        }
        _ => {
            if t < 0.5 {
                lower.copied()
            } else {
                upper.copied()
            }
        }
    }
}

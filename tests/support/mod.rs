//! Synthetic gesture material shared by the integration tests.

use mudra::landmarks::{
    Handedness, LandmarkFrame, NUM_KEYPOINTS, RawHandObservation, RawKeypoint,
};
use mudra::store::SequenceMetadata;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A right-hand raw observation with the wrist at `(wrist_x, wrist_y)` and
/// fingers fanned out from it.
pub fn raw_right_hand(wrist_x: f32, wrist_y: f32) -> RawHandObservation {
    let keypoints = (0..NUM_KEYPOINTS)
        .map(|idx| RawKeypoint {
            x: wrist_x + idx as f32 * 2.0,
            y: wrist_y + idx as f32,
            z: Some(idx as f32 * 0.1),
        })
        .collect();
    RawHandObservation {
        handedness: Handedness::Right,
        keypoints,
    }
}

/// Sinusoidal wrist motion, the shape of a "wave" gesture. `phase_offset`
/// varies the starting point so samples are similar but not identical.
pub fn wave_frames(count: usize, phase_offset: f32) -> Vec<LandmarkFrame> {
    // Seeded jitter keeps samples distinct but the tests deterministic.
    let mut rng = StdRng::seed_from_u64(count as u64 ^ u64::from(phase_offset.to_bits()));
    (0..count)
        .map(|idx| {
            let phase = idx as f32 * 0.35 + phase_offset;
            let mut points = [[0.0_f32; 3]; NUM_KEYPOINTS];
            for (point_idx, point) in points.iter_mut().enumerate() {
                point[0] = phase.sin() + point_idx as f32 * 0.02 + rng.random_range(-0.01..0.01);
                point[1] = 0.3 * phase.cos();
            }
            LandmarkFrame {
                left_hand: None,
                right_hand: Some(points),
            }
        })
        .collect()
}

/// Near-zero motion, the shape of a "still" gesture.
pub fn still_frames(count: usize, jitter: f32) -> Vec<LandmarkFrame> {
    (0..count)
        .map(|idx| {
            let mut points = [[0.0_f32; 3]; NUM_KEYPOINTS];
            for (point_idx, point) in points.iter_mut().enumerate() {
                point[0] = jitter * (idx % 2) as f32 + point_idx as f32 * 0.02;
                point[1] = 0.0;
            }
            LandmarkFrame {
                left_hand: None,
                right_hand: Some(points),
            }
        })
        .collect()
}

pub fn metadata(frame_count: usize) -> SequenceMetadata {
    SequenceMetadata {
        fps: 30.0,
        duration_ms: 3000,
        frame_count,
    }
}

//! Dynamic time warping over per-frame hand features.
//!
//! The engine aligns two variable-length sequences and returns a scalar
//! dissimilarity normalized by `n + m`, so a gesture performed slowly does
//! not look farther from its class purely because it produced more frames.
//! The distance is symmetric with zero self-distance, but it is not a metric;
//! nothing here (or in callers) may assume the triangle inequality.

use crate::landmarks::FrameFeatures;

/// Tuning knobs for the distance computation.
#[derive(Debug, Clone)]
pub struct DtwOptions {
    /// Penalty added to the local cost for each hand present in exactly one
    /// of the two frames.
    ///
    /// Calibration note: this constant was never derived from data; treat it
    /// as a starting point, not ground truth.
    pub missing_hand_penalty: f32,
    /// Sakoe-Chiba band half-width. `None` disables the band and evaluates
    /// the full alignment grid.
    pub band_window: Option<usize>,
}

impl Default for DtwOptions {
    fn default() -> Self {
        Self {
            missing_hand_penalty: 8.0,
            band_window: None,
        }
    }
}

impl DtwOptions {
    /// Build options from the persisted engine config.
    pub fn from_config(settings: &crate::config::DtwSettings) -> Self {
        Self {
            missing_hand_penalty: settings.missing_hand_penalty,
            band_window: settings.band_window,
        }
    }
}

/// Band half-width used when a caller asks for banding without a width:
/// a quarter of the longer sequence, floored at the length difference so the
/// corner cell stays reachable.
pub fn auto_band(n: usize, m: usize) -> usize {
    let window = n.max(m) / 4 + 1;
    window.max(n.abs_diff(m) + 1)
}

/// Local cost between two frames.
///
/// Hands present in both frames contribute their Euclidean block distance;
/// a hand present in exactly one frame contributes the fixed penalty. Two
/// frames that both lack a hand agree about it and pay nothing, so
/// `local_cost(a, a) == 0` holds for every frame.
pub fn local_cost(a: &FrameFeatures, b: &FrameFeatures, missing_hand_penalty: f32) -> f32 {
    let mut squared = 0.0_f32;
    let mut penalty = 0.0_f32;
    for (ours, theirs) in [(&a.left, &b.left), (&a.right, &b.right)] {
        match (ours, theirs) {
            (Some(x), Some(y)) => {
                for (va, vb) in x.iter().zip(y.iter()) {
                    let diff = va - vb;
                    squared += diff * diff;
                }
            }
            (None, None) => {}
            _ => penalty += missing_hand_penalty,
        }
    }
    squared.sqrt() + penalty
}

/// DTW distance between two feature sequences.
///
/// Uses the band from `options` when set, otherwise the full grid. Empty
/// inputs are maximally distant unless both are empty.
pub fn distance(a: &[FrameFeatures], b: &[FrameFeatures], options: &DtwOptions) -> f32 {
    match options.band_window {
        Some(window) => distance_banded(a, b, window, options.missing_hand_penalty),
        None => distance_full(a, b, options.missing_hand_penalty),
    }
}

/// DTW over the full `(n+1) x (m+1)` grid.
pub fn distance_full(a: &[FrameFeatures], b: &[FrameFeatures], missing_hand_penalty: f32) -> f32 {
    let (n, m) = (a.len(), b.len());
    if n == 0 && m == 0 {
        return 0.0;
    }
    if n == 0 || m == 0 {
        return f32::INFINITY;
    }

    // Rolling pair of rows; the full matrix is never materialized.
    let mut previous = vec![f32::INFINITY; m + 1];
    let mut current = vec![f32::INFINITY; m + 1];
    previous[0] = 0.0;

    for i in 1..=n {
        current[0] = f32::INFINITY;
        for j in 1..=m {
            let cost = local_cost(&a[i - 1], &b[j - 1], missing_hand_penalty);
            current[j] = cost + previous[j].min(current[j - 1]).min(previous[j - 1]);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[m] / (n + m) as f32
}

/// DTW constrained to a Sakoe-Chiba band of the given half-width.
///
/// The effective window never shrinks below `|n - m| + 1`, otherwise the
/// band could not reach the terminal cell at all.
pub fn distance_banded(
    a: &[FrameFeatures],
    b: &[FrameFeatures],
    window: usize,
    missing_hand_penalty: f32,
) -> f32 {
    let (n, m) = (a.len(), b.len());
    if n == 0 && m == 0 {
        return 0.0;
    }
    if n == 0 || m == 0 {
        return f32::INFINITY;
    }
    let window = window.max(n.abs_diff(m) + 1);

    let mut previous = vec![f32::INFINITY; m + 1];
    let mut current = vec![f32::INFINITY; m + 1];
    previous[0] = 0.0;

    for i in 1..=n {
        current.fill(f32::INFINITY);
        let j_start = i.saturating_sub(window).max(1);
        let j_end = (i + window).min(m);
        for j in j_start..=j_end {
            let cost = local_cost(&a[i - 1], &b[j - 1], missing_hand_penalty);
            current[j] = cost + previous[j].min(current[j - 1]).min(previous[j - 1]);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[m] / (n + m) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{FEATURES_PER_HAND, FrameFeatures};

    fn frame(value: f32) -> FrameFeatures {
        FrameFeatures {
            left: None,
            right: Some([value; FEATURES_PER_HAND]),
        }
    }

    fn empty_frame() -> FrameFeatures {
        FrameFeatures {
            left: None,
            right: None,
        }
    }

    fn ramp(values: &[f32]) -> Vec<FrameFeatures> {
        values.iter().copied().map(frame).collect()
    }

    #[test]
    fn self_distance_is_zero() {
        let seq = ramp(&[0.0, 0.2, 0.4, 0.6]);
        let options = DtwOptions::default();
        assert_eq!(distance(&seq, &seq, &options), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = ramp(&[0.0, 0.5, 1.0, 0.5, 0.0]);
        let b = ramp(&[0.1, 0.9, 0.2]);
        let options = DtwOptions::default();
        let forward = distance(&a, &b, &options);
        let backward = distance(&b, &a, &options);
        assert!((forward - backward).abs() < 1e-6);
    }

    #[test]
    fn larger_coordinate_gaps_never_reduce_cost() {
        let a = ramp(&[0.0, 0.0, 0.0]);
        let near = ramp(&[0.1, 0.1, 0.1]);
        let far = ramp(&[0.2, 0.2, 0.2]);
        let options = DtwOptions::default();
        let near_cost = distance(&a, &near, &options);
        let far_cost = distance(&a, &far, &options);
        assert!(far_cost >= near_cost);
    }

    #[test]
    fn speed_variation_costs_less_than_shape_variation() {
        let shape = ramp(&[0.0, 0.5, 1.0, 0.5, 0.0]);
        let slower = ramp(&[0.0, 0.25, 0.5, 0.75, 1.0, 0.75, 0.5, 0.25, 0.0]);
        let different = ramp(&[1.0, 1.0, 1.0, 1.0, 1.0]);
        let options = DtwOptions::default();
        let stretched = distance(&shape, &slower, &options);
        let reshaped = distance(&shape, &different, &options);
        assert!(stretched < reshaped);
    }

    #[test]
    fn presence_mismatch_pays_the_penalty() {
        let present = frame(0.0);
        let absent = empty_frame();
        let cost = local_cost(&present, &absent, 8.0);
        assert!((cost - 8.0).abs() < 1e-6);
        // Agreement on absence is free.
        assert_eq!(local_cost(&absent, &absent, 8.0), 0.0);
    }

    #[test]
    fn mismatched_empty_sequence_is_infinitely_far() {
        let seq = ramp(&[0.0, 1.0]);
        let options = DtwOptions::default();
        assert!(distance(&seq, &[], &options).is_infinite());
        assert_eq!(distance(&[], &[], &options), 0.0);
    }

    #[test]
    fn banded_distance_matches_full_on_short_sequences() {
        let a = ramp(&[0.0, 0.3, 0.6, 0.9, 0.6, 0.3]);
        let b = ramp(&[0.0, 0.45, 0.9, 0.45, 0.0]);
        let full = distance_full(&a, &b, 8.0);
        let banded = distance_banded(&a, &b, auto_band(a.len(), b.len()), 8.0);
        // A band wide enough to cover the optimal path reproduces the full
        // result exactly.
        assert!((full - banded).abs() < 1e-5);
    }

    #[test]
    fn band_floor_keeps_unequal_lengths_reachable() {
        let a = ramp(&[0.0; 20]);
        let b = ramp(&[0.0; 3]);
        let cost = distance_banded(&a, &b, 1, 8.0);
        assert!(cost.is_finite());
    }
}

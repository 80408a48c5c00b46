//! k-nearest-neighbor classification over DTW distances.
//!
//! Every stored sequence is a reference template. Classification computes
//! the DTW distance from the query to each template (the dominant cost,
//! fanned out across worker threads), keeps the `k` nearest, and votes with
//! inverse-distance weights.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::mpsc;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dtw::{self, DtwOptions};
use crate::landmarks::{FrameFeatures, feature_sequence};
use crate::store::StoredSequence;

/// Vote weight denominator guard so an exact match does not divide by zero.
const DISTANCE_EPSILON: f32 = 1e-6;

/// Default neighbor count; keep it small and odd.
pub const DEFAULT_K: usize = 3;

/// Classification result with the full per-class probability breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub predicted_class: String,
    /// Winning class's share of the total vote weight, in `0..=1`.
    pub confidence: f32,
    /// Normalized per-class weights over the k-neighbor set.
    pub all_probs: BTreeMap<String, f32>,
}

/// One labeled reference template.
#[derive(Debug, Clone)]
pub struct ReferenceSequence {
    pub class_name: String,
    pub features: Vec<FrameFeatures>,
}

impl ReferenceSequence {
    /// Build a template from a stored sequence.
    pub fn from_stored(sequence: &StoredSequence) -> Self {
        Self {
            class_name: sequence.class_name.clone(),
            features: feature_sequence(&sequence.frames),
        }
    }
}

/// Errors raised during classification.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Model not trained: no reference sequences stored")]
    ModelNotTrained,
}

/// k-NN classifier over a fixed set of reference templates.
pub struct KnnClassifier {
    references: Vec<ReferenceSequence>,
    k: usize,
    dtw: DtwOptions,
}

impl KnnClassifier {
    /// Build a classifier over all stored sequences.
    pub fn new(references: Vec<ReferenceSequence>, k: usize, dtw: DtwOptions) -> Self {
        Self {
            references,
            k: k.max(1),
            dtw,
        }
    }

    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    /// Classify one bounded query sequence.
    pub fn classify(&self, query: &[FrameFeatures]) -> Result<Prediction, ClassifyError> {
        if self.references.is_empty() {
            return Err(ClassifyError::ModelNotTrained);
        }
        let distances = self.distances_to(query);
        let labeled: Vec<(f32, &str)> = distances
            .iter()
            .map(|(idx, distance)| (*distance, self.references[*idx].class_name.as_str()))
            .collect();
        Ok(weighted_vote(&labeled, self.k))
    }

    /// DTW distance from the query to every reference, fanned out across a
    /// scoped worker pool; the reduction happens on the calling thread.
    fn distances_to(&self, query: &[FrameFeatures]) -> Vec<(usize, f32)> {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
            .min(self.references.len().max(1));
        if workers <= 1 {
            return self
                .references
                .iter()
                .enumerate()
                .map(|(idx, reference)| {
                    (idx, dtw::distance(query, &reference.features, &self.dtw))
                })
                .collect();
        }

        let (tx, rx) = mpsc::channel();
        let chunk_len = self.references.len().div_ceil(workers);
        std::thread::scope(|scope| {
            for (chunk_index, chunk) in self.references.chunks(chunk_len).enumerate() {
                let tx = tx.clone();
                let dtw_options = self.dtw.clone();
                scope.spawn(move || {
                    for (offset, reference) in chunk.iter().enumerate() {
                        let idx = chunk_index * chunk_len + offset;
                        let distance = dtw::distance(query, &reference.features, &dtw_options);
                        let _ = tx.send((idx, distance));
                    }
                });
            }
        });
        drop(tx);
        let mut distances: Vec<(usize, f32)> = rx.iter().collect();
        distances.sort_by_key(|(idx, _)| *idx);
        distances
    }
}

/// Inverse-distance weighted vote over the `k` nearest labeled distances.
///
/// Each neighbor contributes `1 / (distance + eps)` to its class; the
/// probability map is the per-class weight sums normalized over the
/// k-neighbor set, and confidence is the winner's share.
pub fn weighted_vote(labeled_distances: &[(f32, &str)], k: usize) -> Prediction {
    let mut sorted: Vec<&(f32, &str)> = labeled_distances.iter().collect();
    sorted.sort_by_key(|(distance, _)| OrderedFloat(*distance));
    let k = k.max(1).min(sorted.len());

    let mut weights: BTreeMap<String, f32> = BTreeMap::new();
    for (distance, class_name) in sorted.into_iter().take(k) {
        let weight = 1.0 / (distance + DISTANCE_EPSILON);
        *weights.entry((*class_name).to_string()).or_insert(0.0) += weight;
    }

    let total: f32 = weights.values().sum();
    let mut all_probs = BTreeMap::new();
    if total > 0.0 && total.is_finite() {
        for (class_name, weight) in &weights {
            all_probs.insert(class_name.clone(), weight / total);
        }
    } else {
        // All k neighbors were infinitely far (or the weights overflowed);
        // fall back to a uniform split rather than NaN probabilities.
        let share = 1.0 / weights.len() as f32;
        for class_name in weights.keys() {
            all_probs.insert(class_name.clone(), share);
        }
    }

    let (predicted_class, confidence) = all_probs
        .iter()
        .max_by_key(|(_, probability)| OrderedFloat(**probability))
        .map(|(class_name, probability)| (class_name.clone(), *probability))
        .unwrap_or_else(|| (String::new(), 0.0));

    Prediction {
        predicted_class,
        confidence,
        all_probs,
    }
}

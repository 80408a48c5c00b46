//! Durable gesture classes, sequences, and the latest model snapshot.
//!
//! Sequences are immutable once stored: they are created whole by the
//! recorder, read by the classifier and trainer, and removed whole by an
//! explicit delete. Classes cascade to their sequences on delete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::landmarks::LandmarkFrame;

mod db;

pub use db::{DB_FILE_NAME, GestureDb, StoreError};

/// Recording window bounds for a gesture class, in seconds.
pub const MIN_CLASS_DURATION_SECONDS: f32 = 2.0;
pub const MAX_CLASS_DURATION_SECONDS: f32 = 6.0;

/// Capture metadata recorded alongside a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceMetadata {
    /// Frame rate the recorder was targeting.
    pub fps: f32,
    /// Declared recording window length.
    pub duration_ms: u64,
    /// Frames actually captured.
    pub frame_count: usize,
}

/// One stored, labeled gesture sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSequence {
    pub id: Uuid,
    pub class_name: String,
    pub frames: Vec<LandmarkFrame>,
    /// Unix timestamp (seconds) of when the sequence was recorded.
    pub recorded_at: i64,
    pub metadata: SequenceMetadata,
}

/// Listing row for a sequence; everything but the frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceSummary {
    pub id: Uuid,
    pub class_name: String,
    pub recorded_at: i64,
    pub metadata: SequenceMetadata,
}

/// A gesture class with its derived sample counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureClass {
    /// Unique key.
    pub name: String,
    pub display_name: String,
    /// Recording window used when capturing new samples for this class.
    pub duration_seconds: f32,
    pub sequence_count: usize,
    pub total_frames: usize,
}

impl GestureClass {
    /// Whether this class gained samples after the given snapshot was taken.
    ///
    /// A class absent from the snapshot counts as never trained, so any
    /// stored sample marks it stale. This is the one staleness definition in
    /// the crate; callers must not re-derive it.
    pub fn is_stale(&self, snapshot: Option<&ModelSnapshot>) -> bool {
        let trained_count = snapshot
            .and_then(|snapshot| snapshot.class_sample_counts.get(&self.name))
            .copied()
            .unwrap_or(0);
        self.sequence_count > trained_count
    }
}

/// Result of the most recent completed training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSnapshot {
    /// Unix timestamp (seconds) of training completion.
    pub trained_at: i64,
    /// Leave-one-out accuracy over the training snapshot.
    pub final_accuracy: f32,
    pub num_classes: usize,
    pub total_samples: usize,
    /// Sequence count per class at training time; the baseline for the
    /// staleness predicate.
    pub class_sample_counts: BTreeMap<String, usize>,
    /// Neighbor count the classifier was validated with.
    pub k: usize,
    /// Frame count of the fixed-length export representation.
    pub downsample_frames: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class(name: &str, count: usize) -> GestureClass {
        GestureClass {
            name: name.to_string(),
            display_name: name.to_string(),
            duration_seconds: 3.0,
            sequence_count: count,
            total_frames: count * 30,
        }
    }

    fn snapshot(counts: &[(&str, usize)]) -> ModelSnapshot {
        ModelSnapshot {
            trained_at: 1_700_000_000,
            final_accuracy: 0.9,
            num_classes: counts.len(),
            total_samples: counts.iter().map(|(_, n)| n).sum(),
            class_sample_counts: counts
                .iter()
                .map(|(name, n)| (name.to_string(), *n))
                .collect(),
            k: 3,
            downsample_frames: 30,
        }
    }

    #[test]
    fn class_matching_snapshot_count_is_fresh() {
        let snapshot = snapshot(&[("wave", 5)]);
        assert!(!class("wave", 5).is_stale(Some(&snapshot)));
    }

    #[test]
    fn new_samples_make_a_class_stale() {
        let snapshot = snapshot(&[("wave", 5)]);
        assert!(class("wave", 6).is_stale(Some(&snapshot)));
    }

    #[test]
    fn class_unknown_to_snapshot_is_stale_once_sampled() {
        let snapshot = snapshot(&[("wave", 5)]);
        assert!(class("point", 1).is_stale(Some(&snapshot)));
        assert!(!class("point", 0).is_stale(Some(&snapshot)));
    }

    #[test]
    fn without_a_snapshot_any_samples_are_stale() {
        assert!(class("wave", 1).is_stale(None));
        assert!(!class("wave", 0).is_stale(None));
    }
}

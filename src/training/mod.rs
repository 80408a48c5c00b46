//! Training and validation orchestration.
//!
//! "Training" here is not parameter fitting: it validates per-class sample
//! counts, runs leave-one-out cross-validation over a consistent snapshot of
//! the store, and persists a model snapshot recording what was validated.
//! The O(S^2) pairwise DTW matrix dominates wall-clock, so the run happens on
//! a background thread with a cancellation flag checked between pairwise
//! comparisons; cancellation latency stays bounded by a single DTW call.

use std::path::PathBuf;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::weighted_vote;
use crate::config::EngineConfig;
use crate::dtw::{self, DtwOptions};
use crate::landmarks::{FrameFeatures, feature_sequence};
use crate::store::{GestureDb, ModelSnapshot, StoreError, StoredSequence};

mod metrics;

pub use metrics::{ClassAccuracy, ConfusionMatrix, accuracy, per_class_accuracy};

/// Parameters for one training pass.
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub k: usize,
    pub min_sequences_per_class: usize,
    pub recommended_sequences_per_class: usize,
    pub downsample_frames: usize,
    pub dtw: DtwOptions,
}

impl TrainingOptions {
    /// Build options from the persisted engine config.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            k: config.classifier.k,
            min_sequences_per_class: config.training.min_sequences_per_class,
            recommended_sequences_per_class: config.training.recommended_sequences_per_class,
            downsample_frames: config.training.downsample_frames,
            dtw: DtwOptions::from_config(&config.dtw),
        }
    }
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// How far below the required minimum one class is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDeficit {
    pub class_name: String,
    pub have: usize,
    pub need: usize,
}

/// Displayable list of classes blocking a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeficitReport(pub Vec<ClassDeficit>);

impl std::fmt::Display for DeficitReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for deficit in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{} has {} sequence(s), needs {}",
                deficit.class_name, deficit.have, deficit.need
            )?;
            first = false;
        }
        Ok(())
    }
}

/// Errors that abort a training pass. No partial snapshot is ever written.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("No stored sequences to train on")]
    NoTrainingData,
    #[error("Insufficient class data: {0}")]
    InsufficientClassData(DeficitReport),
    #[error("Training cancelled")]
    Cancelled,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a completed, uncancelled training pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub snapshot: ModelSnapshot,
    pub per_class: Vec<ClassAccuracy>,
}

/// Poll-friendly state of the background training job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainingStatus {
    Running {
        completed_pairs: usize,
        total_pairs: usize,
    },
    Completed(TrainingOutcome),
    Failed(String),
    Cancelled,
}

impl TrainingStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, TrainingStatus::Running { .. })
    }
}

/// Validate counts and run leave-one-out cross-validation synchronously.
///
/// `sequences` is the consistent snapshot for the whole pass; concurrent
/// store mutations cannot affect it. Progress is reported in completed
/// pairwise comparisons.
pub fn run_validation(
    sequences: &[StoredSequence],
    options: &TrainingOptions,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<TrainingOutcome, TrainingError> {
    if sequences.is_empty() {
        return Err(TrainingError::NoTrainingData);
    }

    let mut class_names: Vec<String> = sequences
        .iter()
        .map(|sequence| sequence.class_name.clone())
        .collect();
    class_names.sort();
    class_names.dedup();

    let counts: Vec<usize> = class_names
        .iter()
        .map(|name| {
            sequences
                .iter()
                .filter(|sequence| sequence.class_name == *name)
                .count()
        })
        .collect();

    let deficits: Vec<ClassDeficit> = class_names
        .iter()
        .zip(&counts)
        .filter(|&(_, &count)| count < options.min_sequences_per_class)
        .map(|(name, &count)| ClassDeficit {
            class_name: name.clone(),
            have: count,
            need: options.min_sequences_per_class,
        })
        .collect();
    if !deficits.is_empty() {
        return Err(TrainingError::InsufficientClassData(DeficitReport(deficits)));
    }
    for (name, &count) in class_names.iter().zip(&counts) {
        if count < options.recommended_sequences_per_class {
            tracing::warn!(
                class = name.as_str(),
                have = count,
                recommended = options.recommended_sequences_per_class,
                "class is below the recommended sample count; accuracy estimates will be coarse"
            );
        }
    }

    let labels: Vec<usize> = sequences
        .iter()
        .map(|sequence| {
            class_names
                .iter()
                .position(|name| name == &sequence.class_name)
                .unwrap_or(0)
        })
        .collect();
    let features: Vec<Vec<FrameFeatures>> = sequences
        .iter()
        .map(|sequence| feature_sequence(&sequence.frames))
        .collect();

    let total = sequences.len();
    let total_pairs = total * (total - 1) / 2;
    let mut matrix = vec![0.0_f32; total * total];
    let mut completed_pairs = 0usize;
    on_progress(completed_pairs, total_pairs);
    for i in 0..total {
        for j in (i + 1)..total {
            if cancel.load(Ordering::Relaxed) {
                return Err(TrainingError::Cancelled);
            }
            let distance = dtw::distance(&features[i], &features[j], &options.dtw);
            matrix[i * total + j] = distance;
            matrix[j * total + i] = distance;
            completed_pairs += 1;
            on_progress(completed_pairs, total_pairs);
        }
    }

    let mut confusion = ConfusionMatrix::new(class_names.len());
    for i in 0..total {
        let labeled: Vec<(f32, &str)> = (0..total)
            .filter(|&j| j != i)
            .map(|j| (matrix[i * total + j], class_names[labels[j]].as_str()))
            .collect();
        let prediction = weighted_vote(&labeled, options.k);
        if let Some(predicted_idx) = class_names
            .iter()
            .position(|name| name == &prediction.predicted_class)
        {
            confusion.add(labels[i], predicted_idx);
        }
    }

    let final_accuracy = accuracy(&confusion);
    let per_class = per_class_accuracy(&confusion, &class_names);
    let snapshot = ModelSnapshot {
        trained_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        final_accuracy,
        num_classes: class_names.len(),
        total_samples: total,
        class_sample_counts: class_names.iter().cloned().zip(counts).collect(),
        k: options.k,
        downsample_frames: options.downsample_frames,
    };
    tracing::info!(
        accuracy = final_accuracy,
        classes = snapshot.num_classes,
        samples = snapshot.total_samples,
        "leave-one-out validation finished"
    );
    Ok(TrainingOutcome {
        snapshot,
        per_class,
    })
}

/// Handle to a background training run.
pub struct TrainingHandle {
    cancel: Arc<AtomicBool>,
    status: Arc<Mutex<TrainingStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl TrainingHandle {
    /// Current job status, for polling surfaces.
    pub fn status(&self) -> TrainingStatus {
        self.status
            .lock()
            .map(|status| status.clone())
            .unwrap_or_else(|_| TrainingStatus::Failed("training status lock poisoned".into()))
    }

    /// Request cancellation; the worker notices between pairwise comparisons.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        !self.status().is_running()
    }

    /// Block until the worker exits and return the final status.
    pub fn join(mut self) -> TrainingStatus {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.status()
    }
}

/// Spawn a training pass against the database in `data_root`.
///
/// The worker opens its own connection, takes its sequence snapshot at
/// start, and writes the model snapshot only on full, uncancelled
/// completion. Sequences added after the snapshot load simply are not part
/// of this pass; deletions cannot corrupt it.
pub fn spawn(data_root: PathBuf, options: TrainingOptions) -> TrainingHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let status = Arc::new(Mutex::new(TrainingStatus::Running {
        completed_pairs: 0,
        total_pairs: 0,
    }));

    let worker_cancel = cancel.clone();
    let worker_status = status.clone();
    let thread = std::thread::spawn(move || {
        let result = train_in_worker(&data_root, &options, &worker_cancel, &worker_status);
        let final_status = match result {
            Ok(outcome) => TrainingStatus::Completed(outcome),
            Err(TrainingError::Cancelled) => {
                tracing::info!("training cancelled; partial progress discarded");
                TrainingStatus::Cancelled
            }
            Err(err) => {
                tracing::error!("training failed: {err}");
                TrainingStatus::Failed(err.to_string())
            }
        };
        if let Ok(mut status) = worker_status.lock() {
            *status = final_status;
        }
    });

    TrainingHandle {
        cancel,
        status,
        thread: Some(thread),
    }
}

fn train_in_worker(
    data_root: &std::path::Path,
    options: &TrainingOptions,
    cancel: &AtomicBool,
    status: &Mutex<TrainingStatus>,
) -> Result<TrainingOutcome, TrainingError> {
    let db = GestureDb::open(data_root)?;
    let sequences = db.load_all_sequences()?;
    tracing::info!(sequences = sequences.len(), "training snapshot loaded");

    let outcome = run_validation(&sequences, options, cancel, |completed_pairs, total_pairs| {
        if let Ok(mut status) = status.lock() {
            *status = TrainingStatus::Running {
                completed_pairs,
                total_pairs,
            };
        }
    })?;

    db.save_snapshot(&outcome.snapshot)?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{LandmarkFrame, NUM_KEYPOINTS};
    use crate::store::SequenceMetadata;
    use uuid::Uuid;

    fn sequence(class_name: &str, amplitude: f32, frames: usize) -> StoredSequence {
        let frames: Vec<LandmarkFrame> = (0..frames)
            .map(|idx| {
                let phase = idx as f32 * 0.4;
                let mut points = [[0.0_f32; 3]; NUM_KEYPOINTS];
                for (point_idx, point) in points.iter_mut().enumerate() {
                    point[0] = amplitude * phase.sin() + point_idx as f32 * 0.01;
                    point[1] = amplitude * phase.cos();
                }
                LandmarkFrame {
                    left_hand: None,
                    right_hand: Some(points),
                }
            })
            .collect();
        StoredSequence {
            id: Uuid::new_v4(),
            class_name: class_name.to_string(),
            recorded_at: 1_700_000_000,
            metadata: SequenceMetadata {
                fps: 30.0,
                duration_ms: 3000,
                frame_count: frames.len(),
            },
            frames,
        }
    }

    fn never_cancel() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn separable_classes_validate_with_high_accuracy() {
        let mut sequences = Vec::new();
        for idx in 0..4 {
            sequences.push(sequence("wave", 1.0 + idx as f32 * 0.02, 24));
            sequences.push(sequence("still", 0.01, 20 + idx));
        }
        let cancel = never_cancel();
        let outcome =
            run_validation(&sequences, &TrainingOptions::default(), &cancel, |_, _| {}).unwrap();
        assert!(outcome.snapshot.final_accuracy > 0.9);
        assert_eq!(outcome.snapshot.num_classes, 2);
        assert_eq!(outcome.snapshot.class_sample_counts["wave"], 4);
        assert_eq!(outcome.per_class.len(), 2);
    }

    #[test]
    fn deficient_class_blocks_training_and_is_named() {
        let sequences = vec![
            sequence("wave", 1.0, 20),
            sequence("still", 0.0, 20),
            sequence("still", 0.0, 22),
            sequence("still", 0.01, 21),
            sequence("still", 0.0, 20),
            sequence("still", 0.0, 23),
            sequence("still", 0.01, 20),
        ];
        let cancel = never_cancel();
        let err = run_validation(&sequences, &TrainingOptions::default(), &cancel, |_, _| {})
            .unwrap_err();
        match err {
            TrainingError::InsufficientClassData(report) => {
                assert_eq!(report.0.len(), 1);
                assert_eq!(report.0[0].class_name, "wave");
                assert_eq!(report.0[0].have, 1);
                assert_eq!(report.0[0].need, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_store_cannot_train() {
        let cancel = never_cancel();
        let err =
            run_validation(&[], &TrainingOptions::default(), &cancel, |_, _| {}).unwrap_err();
        assert!(matches!(err, TrainingError::NoTrainingData));
    }

    #[test]
    fn pre_set_cancel_flag_stops_before_any_result() {
        let sequences = vec![
            sequence("wave", 1.0, 20),
            sequence("wave", 1.0, 21),
            sequence("still", 0.0, 20),
            sequence("still", 0.0, 22),
        ];
        let cancel = AtomicBool::new(true);
        let err = run_validation(&sequences, &TrainingOptions::default(), &cancel, |_, _| {})
            .unwrap_err();
        assert!(matches!(err, TrainingError::Cancelled));
    }

    #[test]
    fn progress_reaches_the_pair_total() {
        let sequences = vec![
            sequence("wave", 1.0, 18),
            sequence("wave", 1.02, 19),
            sequence("still", 0.0, 18),
            sequence("still", 0.01, 18),
        ];
        let cancel = never_cancel();
        let mut last = (0usize, 0usize);
        run_validation(&sequences, &TrainingOptions::default(), &cancel, |done, total| {
            last = (done, total);
        })
        .unwrap();
        assert_eq!(last.0, last.1);
        assert_eq!(last.1, 4 * 3 / 2);
    }
}

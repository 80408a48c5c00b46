//! Evaluation metrics for the leave-one-out validation pass.

use serde::{Deserialize, Serialize};

/// Confusion matrix for a `K`-class classifier.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }
}

/// Per-class held-out accuracy reported after a training pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassAccuracy {
    pub class_name: String,
    /// Sequences of this class in the training snapshot.
    pub support: u32,
    /// Fraction of this class's sequences classified correctly.
    pub accuracy: f32,
}

/// Overall accuracy across the whole matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let mut correct = 0u64;
    let mut total = 0u64;
    for truth in 0..cm.n_classes {
        for predicted in 0..cm.n_classes {
            let count = cm.get(truth, predicted) as u64;
            total += count;
            if truth == predicted {
                correct += count;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        (correct as f32) / (total as f32)
    }
}

/// Per-class accuracy (diagonal over row sum) with supports.
pub fn per_class_accuracy(cm: &ConfusionMatrix, class_names: &[String]) -> Vec<ClassAccuracy> {
    (0..cm.n_classes)
        .map(|class_idx| {
            let mut support = 0u32;
            for predicted in 0..cm.n_classes {
                support = support.saturating_add(cm.get(class_idx, predicted));
            }
            let correct = cm.get(class_idx, class_idx);
            ClassAccuracy {
                class_name: class_names
                    .get(class_idx)
                    .cloned()
                    .unwrap_or_else(|| format!("class_{class_idx}")),
                support,
                accuracy: if support == 0 {
                    0.0
                } else {
                    correct as f32 / support as f32
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn accuracy_counts_the_diagonal() {
        let mut cm = ConfusionMatrix::new(2);
        cm.add(0, 0);
        cm.add(0, 0);
        cm.add(0, 1);
        cm.add(1, 1);
        assert!((accuracy(&cm) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn per_class_accuracy_tracks_row_supports() {
        let mut cm = ConfusionMatrix::new(2);
        cm.add(0, 0);
        cm.add(0, 1);
        cm.add(1, 1);
        let stats = per_class_accuracy(&cm, &names(&["wave", "still"]));
        assert_eq!(stats[0].support, 2);
        assert!((stats[0].accuracy - 0.5).abs() < 1e-6);
        assert_eq!(stats[1].support, 1);
        assert!((stats[1].accuracy - 1.0).abs() < 1e-6);
    }

    #[test]
    fn empty_matrix_has_zero_accuracy() {
        let cm = ConfusionMatrix::new(3);
        assert_eq!(accuracy(&cm), 0.0);
    }

    #[test]
    fn out_of_range_additions_are_ignored() {
        let mut cm = ConfusionMatrix::new(1);
        cm.add(0, 5);
        cm.add(5, 0);
        assert_eq!(cm.get(0, 0), 0);
    }
}

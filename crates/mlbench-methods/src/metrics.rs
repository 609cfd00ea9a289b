//! Classification metrics on top of linfa's confusion matrix.
//!
//! Labels are arbitrary numbers. Predictions are rounded to the nearest
//! integer before they are matched against the true classes, so regression
//! output (elastic net) can be scored with the same code as class labels.
//! The rounded values are mapped to class indices and handed to
//! [`linfa::metrics::ToConfusionMatrix`].
use std::collections::HashMap;

use anyhow::{Context, Result};
use linfa::dataset::{AsTargets, Labels};
use linfa::metrics::{SingleTargetRegression, ToConfusionMatrix};
use ndarray::{Array1, ArrayView1, Ix1};

use crate::error::BenchError;

/// Ground-truth class indices that report every known class as a label,
/// including classes that only occur among the predictions.
struct ClassTargets {
    indices: Array1<usize>,
    n_classes: usize,
}

impl AsTargets for ClassTargets {
    type Elem = usize;
    type Ix = Ix1;

    fn as_targets(&self) -> ArrayView1<usize> {
        self.indices.view()
    }
}

impl Labels for ClassTargets {
    type Elem = usize;

    fn label_count(&self) -> Vec<HashMap<usize, usize>> {
        let mut counts: HashMap<usize, usize> = (0..self.n_classes).map(|class| (class, 0)).collect();
        for &class in self.indices.iter() {
            *counts.entry(class).or_insert(0) += 1;
        }
        vec![counts]
    }
}

pub struct ConfusionMatrix {
    /// Sorted distinct labels; class index `i` refers to `classes[i]`.
    classes: Vec<f64>,
    inner: linfa::metrics::ConfusionMatrix<usize>,
}

fn class_key(value: f64) -> f64 {
    if value.is_nan() {
        return f64::NAN;
    }
    let rounded = value.round();
    // Avoid -0.0 and 0.0 becoming separate classes.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// linfa yields NaN for 0/0 ratios; those count as 0 here.
fn finite_or_zero(value: f32) -> f64 {
    if value.is_finite() {
        value as f64
    } else {
        0.0
    }
}

impl ConfusionMatrix {
    /// Build the matrix from true and predicted labels. NaN predictions form
    /// a class of their own and therefore always count as misses.
    pub fn new(truth: &Array1<f64>, predicted: &Array1<f64>) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(BenchError::LengthMismatch {
                expected: truth.len(),
                found: predicted.len(),
            }
            .into());
        }

        let mut classes: Vec<f64> = truth
            .iter()
            .chain(predicted.iter())
            .map(|&v| class_key(v))
            .collect();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup_by(|a, b| a.total_cmp(b).is_eq());

        let index_of = |value: &f64| {
            classes
                .binary_search_by(|class| class.total_cmp(&class_key(*value)))
                .unwrap_or(0)
        };
        let targets = ClassTargets {
            indices: truth.iter().map(index_of).collect(),
            n_classes: classes.len(),
        };
        let predicted: Array1<usize> = predicted.iter().map(index_of).collect();

        let inner = targets
            .confusion_matrix(&predicted)
            .context("Failed to build the confusion matrix")?;
        Ok(Self { classes, inner })
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    /// The mean of a per-class binary score over every class.
    fn class_average(&self, score: impl Fn(&linfa::metrics::ConfusionMatrix<bool>) -> f32) -> f64 {
        let per_class = self.inner.split_one_vs_all();
        if per_class.is_empty() {
            return 0.0;
        }
        per_class.iter().map(|cm| finite_or_zero(score(cm))).sum::<f64>() / per_class.len() as f64
    }
}

/// Fraction of correctly classified samples.
pub fn average_accuracy(cm: &ConfusionMatrix) -> f64 {
    finite_or_zero(cm.inner.accuracy())
}

/// Multi-class Matthews correlation coefficient.
///
/// 1 for a perfect prediction, 0 when no better than chance or when either
/// the truth or the prediction contains a single class.
pub fn mcc_multi_class(cm: &ConfusionMatrix) -> f64 {
    finite_or_zero(cm.inner.mcc())
}

/// Precision averaged over all classes.
pub fn avg_precision(cm: &ConfusionMatrix) -> f64 {
    cm.class_average(|binary| binary.precision())
}

/// Recall averaged over all classes.
pub fn avg_recall(cm: &ConfusionMatrix) -> f64 {
    cm.class_average(|binary| binary.recall())
}

/// Mean squared difference between the raw label values.
pub fn simple_mean_squared_error(truth: &Array1<f64>, predicted: &Array1<f64>) -> Result<f64> {
    if truth.len() != predicted.len() {
        return Err(BenchError::LengthMismatch {
            expected: truth.len(),
            found: predicted.len(),
        }
        .into());
    }
    if truth.is_empty() {
        return Ok(0.0);
    }
    predicted
        .mean_squared_error(truth)
        .context("Failed to compute the mean squared error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_predictions_are_rounded_into_classes() {
        let truth = array![0.0, 0.0, 1.0, 2.0];
        let predicted = array![0.0, 1.0, 1.0, 2.2];
        let cm = ConfusionMatrix::new(&truth, &predicted).unwrap();
        assert_eq!(cm.classes(), &[0.0, 1.0, 2.0]);
        // 2.2 rounds to class 2, so only the second sample is a miss
        assert!(approx(average_accuracy(&cm), 0.75));
    }

    #[test]
    fn test_length_mismatch() {
        let truth = array![0.0, 1.0];
        let predicted = array![0.0];
        assert!(ConfusionMatrix::new(&truth, &predicted).is_err());
        assert!(simple_mean_squared_error(&truth, &predicted).is_err());
    }

    #[test]
    fn test_perfect_prediction() {
        let labels = array![1.0, 2.0, 3.0, 1.0, 2.0, 3.0];
        let cm = ConfusionMatrix::new(&labels, &labels).unwrap();
        assert!(approx(average_accuracy(&cm), 1.0));
        assert!(approx(mcc_multi_class(&cm), 1.0));
        assert!(approx(avg_precision(&cm), 1.0));
        assert!(approx(avg_recall(&cm), 1.0));
        assert!(approx(simple_mean_squared_error(&labels, &labels).unwrap(), 0.0));
    }

    #[test]
    fn test_binary_metrics() {
        // TP = 2, FN = 1, FP = 1, TN = 2 for class 1
        let truth = array![1.0, 1.0, 1.0, 0.0, 0.0, 0.0];
        let predicted = array![1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let cm = ConfusionMatrix::new(&truth, &predicted).unwrap();
        assert!(approx(average_accuracy(&cm), 4.0 / 6.0));
        assert!(approx(avg_precision(&cm), 2.0 / 3.0));
        assert!(approx(avg_recall(&cm), 2.0 / 3.0));
        // Binary MCC: (TP*TN - FP*FN) / sqrt((TP+FP)(TP+FN)(TN+FP)(TN+FN)) = 3 / 9
        assert!(approx(mcc_multi_class(&cm), 1.0 / 3.0));
        assert!(approx(simple_mean_squared_error(&truth, &predicted).unwrap(), 2.0 / 6.0));
    }

    #[test]
    fn test_precision_and_recall_are_not_swapped() {
        // class 0: TP = 1, FP = 0, FN = 2; class 1: TP = 2, FP = 2, FN = 0
        let truth = array![0.0, 0.0, 0.0, 1.0, 1.0];
        let predicted = array![0.0, 1.0, 1.0, 1.0, 1.0];
        let cm = ConfusionMatrix::new(&truth, &predicted).unwrap();
        assert!(approx(avg_precision(&cm), (1.0 + 0.5) / 2.0));
        assert!(approx(avg_recall(&cm), (1.0 / 3.0 + 1.0) / 2.0));
    }

    #[test]
    fn test_class_only_in_predictions_counts() {
        let truth = array![0.0, 0.0, 1.0, 1.0];
        let predicted = array![0.0, 5.0, 1.0, 1.0];
        let cm = ConfusionMatrix::new(&truth, &predicted).unwrap();
        assert_eq!(cm.classes(), &[0.0, 1.0, 5.0]);
        assert!(approx(average_accuracy(&cm), 0.75));
    }

    #[test]
    fn test_nan_predictions_share_one_class() {
        let truth = array![0.0, 1.0, 0.0, 1.0];
        let predicted = array![f64::NAN, 1.0, -f64::NAN, 1.0];
        let cm = ConfusionMatrix::new(&truth, &predicted).unwrap();
        assert_eq!(cm.classes().len(), 3);
        assert!(cm.classes()[2].is_nan());
        assert!(approx(average_accuracy(&cm), 0.5));
    }

    #[test]
    fn test_constant_prediction_has_zero_mcc() {
        let truth = array![0.0, 1.0, 0.0, 1.0];
        let predicted = array![1.0, 1.0, 1.0, 1.0];
        let cm = ConfusionMatrix::new(&truth, &predicted).unwrap();
        assert_eq!(mcc_multi_class(&cm), 0.0);
        assert!(approx(avg_precision(&cm), 0.25));
        assert!(approx(avg_recall(&cm), 0.5));
    }

    #[test]
    fn test_empty_inputs() {
        let empty = Array1::<f64>::zeros(0);
        let cm = ConfusionMatrix::new(&empty, &empty).unwrap();
        assert_eq!(average_accuracy(&cm), 0.0);
        assert_eq!(avg_precision(&cm), 0.0);
        assert_eq!(simple_mean_squared_error(&empty, &empty).unwrap(), 0.0);
    }
}

use anyhow::{bail, Result};
use ndarray::{Array1, Array2};

/// Maps arbitrary numeric labels to dense class indices `0..n_classes` and back.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelEncoder {
    classes: Vec<f64>,
}

impl LabelEncoder {
    pub fn fit(labels: &Array1<f64>) -> Self {
        let mut classes = labels.to_vec();
        classes.sort_by(|a, b| a.total_cmp(b));
        classes.dedup();
        Self { classes }
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[f64] {
        &self.classes
    }

    pub fn encode(&self, labels: &Array1<f64>) -> Result<Array1<usize>> {
        labels
            .iter()
            .map(|label| match self.classes.binary_search_by(|c| c.total_cmp(label)) {
                Ok(index) => Ok(index),
                Err(_) => bail!("Label {} was not seen while fitting", label),
            })
            .collect()
    }

    pub fn decode(&self, index: usize) -> f64 {
        self.classes[index]
    }
}

/// Most frequent value in `values`; ties go to the smallest value.
pub fn majority_vote(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let value = sorted[i];
        let run = sorted[i..].iter().take_while(|&&v| v == value).count().max(1);
        if best.map_or(true, |(_, count)| run > count) {
            best = Some((value, run));
        }
        i += run;
    }
    best.map(|(value, _)| value)
}

/// Index of the largest entry; ties go to the lowest index.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, value) in values.iter().enumerate() {
        if best.map_or(true, |b| *value > values[b]) {
            best = Some(i);
        }
    }
    best
}

/// Error if a test matrix does not have the feature count the model was fitted with.
pub fn check_features(expected: usize, test: &Array2<f64>) -> Result<()> {
    if test.ncols() != expected {
        bail!(
            "Test data has {} features but the model was fitted on {}",
            test.ncols(),
            expected
        );
    }
    Ok(())
}

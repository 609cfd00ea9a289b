use std::fmt::Debug;

use anyhow::Result;
use ndarray::{Array1, Array2};

use crate::error::BenchError;

/// One estimator family as seen by the benchmark wrapper.
///
/// Implementations carry no per-run state: the parsed configuration and the
/// fitted model are owned by the wrapper and passed back in. The estimator
/// itself is shared with the worker thread, hence `Send + Sync`.
pub trait Estimator: Send + Sync + 'static {
    type Config: Clone + Debug + PartialEq + Send + Sync + 'static;
    type Model: Send + 'static;

    /// Human readable name used in logs and reports.
    fn name(&self) -> &str;

    /// Parse the free-form options string, falling back to defaults for
    /// absent flags and rejecting invalid values.
    fn parse_options(&self, options: &str) -> Result<Self::Config, BenchError>;

    /// Fit a model on `train` with one label per row.
    fn build_model(
        &self,
        config: &Self::Config,
        train: &Array2<f64>,
        labels: &Array1<f64>,
    ) -> Result<Self::Model>;

    /// Run inference on `test`, producing one label (or regression value) per row.
    fn predict(
        &self,
        config: &Self::Config,
        model: &Self::Model,
        test: &Array2<f64>,
    ) -> Result<Array1<f64>>;
}

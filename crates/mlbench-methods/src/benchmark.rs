//! The per-method benchmark wrapper.
//!
//! A [`Benchmark`] owns one estimator, the dataset description and the
//! per-run state (parsed configuration and fitted model). It moves through
//! [`WrapperState`] in one direction only:
//!
//! `Unconfigured -> Configured -> Fitted -> Reported`
//!
//! The fitted model either comes back from the timed run together with its
//! timing, or is built lazily when the report needs predictions and no model
//! is held yet. Every successful timed run replaces the held model, and a
//! configuration that differs from the previous one discards it, so a report
//! always scores a model fitted with the options it was asked for.
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::data_handling::{load_dataset, load_labels, split_train_data, DatasetSpec};
use crate::error::BenchError;
use crate::metrics::{
    average_accuracy, avg_precision, avg_recall, mcc_multi_class, simple_mean_squared_error,
    ConfusionMatrix,
};
use crate::models::estimator::Estimator;
use crate::report::{Metric, MetricsReport, Outcome};
use crate::runner::{run_timed, Measurement, Timing};
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WrapperState {
    Unconfigured,
    Configured,
    Fitted,
    Reported,
}

/// Object-safe view of a [`Benchmark`], so callers can hold any method
/// behind one type.
pub trait MethodBenchmark: Send {
    fn name(&self) -> &str;

    fn state(&self) -> WrapperState;

    /// Parse `options` into the wrapper's configuration.
    fn configure(&mut self, options: &str) -> Result<(), BenchError>;

    /// Time one load/fit/predict pass. Every failure is the sentinel.
    fn run_benchmark(&mut self, options: &str) -> Timing;

    /// Run the benchmark and, when ground-truth labels are listed, score the
    /// predictions on the test set.
    fn compute_report(&mut self, options: &str) -> Outcome;

    /// Build the report for a timing measured elsewhere, e.g. in a worker
    /// process. The wrapper must already be configured.
    fn report_from(&mut self, timing: Timing) -> Outcome;
}

pub struct Benchmark<E: Estimator> {
    estimator: Arc<E>,
    datasets: Arc<DatasetSpec>,
    timeout: Option<Duration>,
    verbose: bool,
    config: Option<E::Config>,
    model: Option<E::Model>,
    state: WrapperState,
}

impl<E: Estimator> Benchmark<E> {
    pub fn new(estimator: E, datasets: DatasetSpec) -> Self {
        Self {
            estimator: Arc::new(estimator),
            datasets: Arc::new(datasets),
            timeout: None,
            verbose: false,
            config: None,
            model: None,
            state: WrapperState::Unconfigured,
        }
    }

    /// Bound the timed run. `None` or zero runs it on the calling thread.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn datasets(&self) -> &DatasetSpec {
        &self.datasets
    }

    pub fn config(&self) -> Option<&E::Config> {
        self.config.as_ref()
    }

    pub fn model(&self) -> Option<&E::Model> {
        self.model.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn advance(&mut self, to: WrapperState) {
        if to > self.state {
            self.state = to;
        }
    }

    fn hold_model(&mut self, model: E::Model) {
        self.model = Some(model);
        self.advance(WrapperState::Fitted);
    }

    /// Fit a fresh model from the current configuration.
    pub fn build_model(&self, train: &Array2<f64>, labels: &Array1<f64>) -> Result<E::Model> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| anyhow!("{} benchmark is not configured", self.estimator.name()))?;
        self.estimator.build_model(config, train, labels)
    }

    /// The held model, fitting one from the training file if there is none.
    fn fitted_model(&mut self) -> Result<&E::Model> {
        if self.model.is_none() {
            if self.verbose {
                log::info!("Building {} model for the report", self.estimator.name());
            }
            let (train, labels) = split_train_data(&self.datasets)?;
            let model = self.build_model(&train, &labels)?;
            self.hold_model(model);
        }
        self.model
            .as_ref()
            .ok_or_else(|| anyhow!("{} model is missing", self.estimator.name()))
    }

    fn score(&mut self, report: &mut MetricsReport) -> Result<()> {
        let (test_file, labels_file) = match (self.datasets.test_file(), self.datasets.labels_file()) {
            (Some(test), Some(labels)) => (test.to_path_buf(), labels.to_path_buf()),
            _ => return Ok(()),
        };
        let test = load_dataset(&test_file)?;
        let truth = load_labels(&labels_file)?;

        let estimator = Arc::clone(&self.estimator);
        let config = self
            .config
            .clone()
            .ok_or_else(|| anyhow!("{} benchmark is not configured", estimator.name()))?;
        let model = self.fitted_model()?;
        let predicted = estimator
            .predict(&config, model, &test)
            .with_context(|| format!("{} prediction failed", estimator.name()))?;

        let cm = ConfusionMatrix::new(&truth, &predicted)?;
        report.add_metric(Metric::Accuracy, average_accuracy(&cm));
        report.add_metric(Metric::Mcc, mcc_multi_class(&cm));
        report.add_metric(Metric::Precision, avg_precision(&cm));
        report.add_metric(Metric::Recall, avg_recall(&cm));
        report.add_metric(Metric::Mse, simple_mean_squared_error(&truth, &predicted)?);
        Ok(())
    }
}

/// Load, fit and predict once, timing fit plus inference.
fn measure<E: Estimator>(
    estimator: &E,
    config: &E::Config,
    datasets: &DatasetSpec,
) -> Result<(Timing, E::Model)> {
    let (train, labels) = split_train_data(datasets)?;
    let test_file = datasets
        .test_file()
        .ok_or(BenchError::InsufficientDatasets {
            required: 2,
            found: datasets.len(),
        })?;
    let test = load_dataset(test_file)?;

    let mut timer = Timer::new();
    let model = timer.time(|| -> Result<E::Model> {
        let model = estimator.build_model(config, &train, &labels)?;
        estimator.predict(config, &model, &test)?;
        Ok(model)
    })?;
    Ok((Timing::from_secs(timer.elapsed_time()), model))
}

impl<E: Estimator> MethodBenchmark for Benchmark<E> {
    fn name(&self) -> &str {
        self.estimator.name()
    }

    fn state(&self) -> WrapperState {
        self.state
    }

    fn configure(&mut self, options: &str) -> Result<(), BenchError> {
        let config = self.estimator.parse_options(options)?;
        if self.verbose {
            log::info!("{} options: {:?}", self.estimator.name(), config);
        }
        if self.config.as_ref() != Some(&config) && self.model.take().is_some() {
            log::debug!("{} options changed, dropping the fitted model", self.estimator.name());
        }
        self.config = Some(config);
        self.advance(WrapperState::Configured);
        Ok(())
    }

    fn run_benchmark(&mut self, options: &str) -> Timing {
        if let Err(e) = self.configure(options) {
            log::error!("{}: {}", self.estimator.name(), e);
            return Timing::FAILED;
        }
        let Some(config) = self.config.clone() else {
            return Timing::FAILED;
        };
        if self.verbose {
            log::info!("Running {} benchmark", self.estimator.name());
        }

        let estimator = Arc::clone(&self.estimator);
        let datasets = Arc::clone(&self.datasets);
        let measurement = run_timed(self.timeout, move |sender| {
            let measurement = match measure(&*estimator, &config, &datasets) {
                Ok((timing, model)) => Measurement::completed(timing, model),
                Err(e) => {
                    log::debug!("{} benchmark failed: {:#}", estimator.name(), e);
                    Measurement::failed()
                }
            };
            sender.send(measurement);
        });

        if let Some(model) = measurement.model {
            self.hold_model(model);
        }
        if self.verbose && !measurement.timing.is_failure() {
            log::info!(
                "{} finished in {:.4}s",
                self.estimator.name(),
                measurement.timing.secs()
            );
        }
        measurement.timing
    }

    fn compute_report(&mut self, options: &str) -> Outcome {
        if let Err(e) = self.datasets.require(2) {
            log::error!("{}: {}", self.estimator.name(), e);
            return Outcome::failed();
        }
        let timing = self.run_benchmark(options);
        self.report_from(timing)
    }

    fn report_from(&mut self, timing: Timing) -> Outcome {
        if timing.is_failure() {
            return Outcome::Failure(timing);
        }
        if self.config.is_none() {
            log::error!("{} benchmark is not configured", self.estimator.name());
            return Outcome::failed();
        }

        let mut report = MetricsReport::new(self.estimator.name(), timing);
        if let Err(e) = self.score(&mut report) {
            log::error!("{}: failed to compute metrics: {:#}", self.estimator.name(), e);
            return Outcome::failed();
        }
        self.advance(WrapperState::Reported);
        Outcome::Report(report)
    }
}

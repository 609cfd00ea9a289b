//! Benchmark results as handed back to callers.
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::runner::Timing;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Metric {
    Runtime,
    #[serde(rename = "ACC")]
    Accuracy,
    #[serde(rename = "MCC")]
    Mcc,
    Precision,
    Recall,
    #[serde(rename = "MSE")]
    Mse,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Runtime => "Runtime",
            Metric::Accuracy => "ACC",
            Metric::Mcc => "MCC",
            Metric::Precision => "Precision",
            Metric::Recall => "Recall",
            Metric::Mse => "MSE",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<Metric, f64>,
}

impl MetricsReport {
    /// A report holding only the runtime of a successful run.
    pub fn new(method: impl Into<String>, runtime: Timing) -> Self {
        let mut metrics = BTreeMap::new();
        metrics.insert(Metric::Runtime, runtime.secs());
        Self {
            method: method.into(),
            timestamp: Utc::now(),
            metrics,
        }
    }

    pub fn add_metric(&mut self, metric: Metric, value: f64) {
        self.metrics.insert(metric, value);
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied()
    }

    pub fn runtime(&self) -> Timing {
        self.get(Metric::Runtime)
            .map(Timing::from_secs)
            .unwrap_or(Timing::FAILED)
    }
}

/// Either the failure sentinel or a full report.
///
/// Serialises untagged, so a failed run is the bare number `-1.0` and a
/// successful one is the report object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Failure(Timing),
    Report(MetricsReport),
}

impl Outcome {
    pub fn failed() -> Self {
        Outcome::Failure(Timing::FAILED)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub fn runtime(&self) -> Timing {
        match self {
            Outcome::Failure(timing) => *timing,
            Outcome::Report(report) => report.runtime(),
        }
    }

    pub fn report(&self) -> Option<&MetricsReport> {
        match self {
            Outcome::Report(report) => Some(report),
            Outcome::Failure(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_always_has_runtime() {
        let report = MetricsReport::new("SVM", Timing::from_secs(0.5));
        assert_eq!(report.get(Metric::Runtime), Some(0.5));
        assert_eq!(report.get(Metric::Accuracy), None);
        assert_eq!(report.metrics.len(), 1);
    }

    #[test]
    fn test_outcome_serialisation() {
        let failed = serde_json::to_string(&Outcome::failed()).unwrap();
        assert_eq!(failed, "-1.0");

        let mut report = MetricsReport::new("ANN", Timing::from_secs(1.25));
        report.add_metric(Metric::Accuracy, 1.0);
        let json = serde_json::to_value(Outcome::Report(report)).unwrap();
        assert_eq!(json["metrics"]["Runtime"], 1.25);
        assert_eq!(json["metrics"]["ACC"], 1.0);
        assert_eq!(json["method"], "ANN");
    }

    #[test]
    fn test_outcome_runtime() {
        assert!(Outcome::failed().runtime().is_failure());
        let outcome = Outcome::Report(MetricsReport::new("ElasticNet", Timing::from_secs(2.0)));
        assert_eq!(outcome.runtime().secs(), 2.0);
        assert!(!outcome.is_failure());
        assert_eq!(Metric::Mse.to_string(), "MSE");
    }
}

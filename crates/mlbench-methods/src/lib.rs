//! mlbench-methods: time-bounded benchmarks of classical estimators.
//!
//! Each supported method (approximate nearest neighbours, elastic net and
//! support vector classification, all backed by `linfa`) is wrapped in a
//! [`benchmark::Benchmark`] that parses a free-form options string, times one
//! fit plus inference pass under an optional timeout and, when ground-truth
//! labels are available, scores the predictions.
//!
//! Every failure a caller can observe (bad options, a failing fit, a timeout,
//! missing inputs) is reported as the negative timing sentinel
//! [`runner::Timing::FAILED`], never as an error.
pub mod benchmark;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod metrics;
pub mod models;
pub mod report;
pub mod runner;
pub mod timer;

pub use benchmark::{Benchmark, MethodBenchmark, WrapperState};
pub use config::Method;
pub use data_handling::DatasetSpec;
pub use models::factory::build_benchmark;
pub use report::{Metric, MetricsReport, Outcome};
pub use runner::Timing;

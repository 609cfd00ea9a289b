//! Benchmark suites described in a JSON file.
//!
//! ```json
//! {
//!   "timeout": 60,
//!   "verbose": false,
//!   "isolate": true,
//!   "runs": [
//!     { "method": "svm", "datasets": ["train.csv", "test.csv", "labels.csv"], "options": "-k linear" }
//!   ]
//! }
//! ```
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mlbench_methods::{DatasetSpec, Method, Outcome};

use crate::run::{run_request, timeout_from_secs, RunRequest};

/// Global settings plus the list of runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Seconds per run; absent or zero means unbounded.
    pub timeout: Option<f64>,
    pub verbose: bool,
    /// `true` runs every benchmark in a worker process that is killed on
    /// timeout, `false` keeps every run in process. Absent, only bounded
    /// runs use a worker.
    pub isolate: Option<bool>,
    pub runs: Vec<RunEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEntry {
    pub method: Method,
    pub datasets: DatasetSpec,
    #[serde(default)]
    pub options: String,
    /// Overrides the suite timeout for this run.
    #[serde(default)]
    pub timeout: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub method: Method,
    pub options: String,
    pub outcome: Outcome,
}

/// Load a suite configuration from a JSON file.
pub fn load_suite_config<P: AsRef<Path>>(path: P) -> Result<SuiteConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
    let config: SuiteConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;
    Ok(config)
}

impl SuiteConfig {
    /// Resolve every entry into a request. A bad timeout anywhere rejects
    /// the whole suite before anything runs.
    pub fn requests(&self) -> Result<Vec<RunRequest>> {
        self.runs
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let timeout = timeout_from_secs(entry.timeout.or(self.timeout))
                    .with_context(|| format!("Run {} ({})", i, entry.method))?;
                Ok(RunRequest {
                    method: entry.method,
                    datasets: entry.datasets.clone(),
                    options: entry.options.clone(),
                    timeout,
                    verbose: self.verbose,
                })
            })
            .collect()
    }
}

/// Run every entry in order. `worker_exe` is the binary to spawn workers
/// from for runs placed in a worker process.
pub fn run_suite(config: &SuiteConfig, worker_exe: Option<&Path>) -> Result<Vec<RunResult>> {
    let requests = config.requests()?;
    let mut results = Vec::with_capacity(requests.len());
    for request in requests {
        let outcome = run_request(&request, config.isolate, worker_exe);
        if outcome.is_failure() {
            log::info!("{} run failed", request.method);
        }
        results.push(RunResult {
            method: request.method,
            options: request.options,
            outcome,
        });
    }
    Ok(results)
}

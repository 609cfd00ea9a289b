//! Running one benchmark, in process or in a killable worker process.
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Result};

use mlbench_methods::runner::run_isolated;
use mlbench_methods::{build_benchmark, DatasetSpec, Method, Outcome, Timing};

/// Name of the hidden subcommand that runs one timed pass and prints the
/// elapsed seconds on stdout.
pub const WORKER_SUBCOMMAND: &str = "worker";

/// One benchmark invocation as requested on the command line or in a suite.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub method: Method,
    pub datasets: DatasetSpec,
    pub options: String,
    pub timeout: Option<Duration>,
    pub verbose: bool,
}

/// Convert a timeout in seconds. Absent or zero means unbounded.
pub fn timeout_from_secs(secs: Option<f64>) -> Result<Option<Duration>> {
    match secs {
        None => Ok(None),
        Some(secs) if secs == 0.0 => Ok(None),
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => bail!("Invalid timeout: {} (expected a non-negative number of seconds)", secs),
    }
}

/// Where the timed pass of a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// On a thread of this process. A timed-out fit keeps running there.
    InProcess,
    /// In a child process that is killed on timeout.
    Worker,
}

/// `isolate` forces the placement. Without it, bounded runs go to a worker
/// and unbounded runs stay in process.
pub fn placement(request: &RunRequest, isolate: Option<bool>) -> Placement {
    match isolate {
        Some(true) => Placement::Worker,
        Some(false) => Placement::InProcess,
        None if request.timeout.is_some() => Placement::Worker,
        None => Placement::InProcess,
    }
}

/// Run `request` where [`placement`] puts it. Worker runs fall back to the
/// current process when no worker binary is known.
pub fn run_request(request: &RunRequest, isolate: Option<bool>, worker_exe: Option<&Path>) -> Outcome {
    match (placement(request, isolate), worker_exe) {
        (Placement::Worker, Some(exe)) => run_in_worker(exe, request),
        (Placement::Worker, None) => {
            log::warn!("No worker binary available; running {} in process", request.method);
            run_in_process(request)
        }
        (Placement::InProcess, _) => run_in_process(request),
    }
}

/// Run the benchmark on a worker thread of this process.
pub fn run_in_process(request: &RunRequest) -> Outcome {
    let mut bench = build_benchmark(
        request.method,
        request.datasets.clone(),
        request.timeout,
        request.verbose,
    );
    bench.compute_report(&request.options)
}

/// Arguments that make `exe` run `request` as a worker.
pub fn worker_command(exe: &Path, request: &RunRequest) -> Command {
    let mut command = Command::new(exe);
    command
        .arg(WORKER_SUBCOMMAND)
        .arg(request.method.key())
        .arg(format!("--options={}", request.options));
    for file in request.datasets.files() {
        command.arg("-d").arg(file);
    }
    command
}

/// Time the benchmark in a child process of `exe` that is killed when the
/// timeout passes, then build the report here.
///
/// The fitted model stays in the child, so the report phase fits its own.
pub fn run_in_worker(exe: &Path, request: &RunRequest) -> Outcome {
    let mut bench = build_benchmark(request.method, request.datasets.clone(), None, request.verbose);
    if let Err(e) = request.datasets.require(2) {
        log::error!("{}: {}", request.method, e);
        return Outcome::failed();
    }
    if let Err(e) = bench.configure(&request.options) {
        log::error!("{}: {}", request.method, e);
        return Outcome::failed();
    }
    if request.verbose {
        log::info!("Running {} in a worker process", request.method);
    }
    let timing = run_isolated(worker_command(exe, request), request.timeout);
    bench.report_from(timing)
}

/// Body of the worker subcommand: one unbounded timed pass.
pub fn worker_timing(method: Method, files: Vec<PathBuf>, options: &str) -> Timing {
    let mut bench = build_benchmark(method, DatasetSpec::new(files), None, false);
    bench.run_benchmark(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_conversion() {
        assert_eq!(timeout_from_secs(None).unwrap(), None);
        assert_eq!(timeout_from_secs(Some(0.0)).unwrap(), None);
        assert_eq!(
            timeout_from_secs(Some(1.5)).unwrap(),
            Some(Duration::from_millis(1500))
        );
        assert!(timeout_from_secs(Some(-1.0)).is_err());
        assert!(timeout_from_secs(Some(f64::NAN)).is_err());
    }

    fn request(timeout: Option<Duration>) -> RunRequest {
        RunRequest {
            method: Method::Ann,
            datasets: DatasetSpec::new(["train.csv", "test.csv"]),
            options: String::new(),
            timeout,
            verbose: false,
        }
    }

    #[test]
    fn test_bounded_runs_default_to_a_worker() {
        let bounded = request(Some(Duration::from_secs(5)));
        let unbounded = request(None);
        assert_eq!(placement(&bounded, None), Placement::Worker);
        assert_eq!(placement(&unbounded, None), Placement::InProcess);
        assert_eq!(placement(&bounded, Some(false)), Placement::InProcess);
        assert_eq!(placement(&unbounded, Some(true)), Placement::Worker);
    }

    #[test]
    fn test_worker_without_binary_runs_in_process() {
        let mut missing = request(Some(Duration::from_secs(5)));
        missing.datasets = DatasetSpec::new(["/nonexistent/train.csv", "/nonexistent/test.csv"]);
        assert!(run_request(&missing, None, None).is_failure());
    }

    #[test]
    fn test_worker_command_arguments() {
        let request = RunRequest {
            method: Method::Svm,
            datasets: DatasetSpec::new(["train.csv", "test.csv"]),
            options: "-k linear -c 2".to_string(),
            timeout: None,
            verbose: false,
        };
        let command = worker_command(Path::new("mlbench"), &request);
        let args: Vec<String> = command
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec!["worker", "svm", "--options=-k linear -c 2", "-d", "train.csv", "-d", "test.csv"]
        );
    }

    #[test]
    fn test_in_process_run_with_missing_files_fails() {
        let request = RunRequest {
            method: Method::Ann,
            datasets: DatasetSpec::new(["/nonexistent/train.csv"]),
            options: String::new(),
            timeout: None,
            verbose: false,
        };
        assert!(run_in_process(&request).is_failure());
    }
}

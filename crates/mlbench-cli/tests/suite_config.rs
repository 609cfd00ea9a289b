//! Integration tests for suite configuration parsing and execution.

use std::time::Duration;

use mlbench_cli::run::{placement, Placement};
use mlbench_cli::suite::{load_suite_config, run_suite, SuiteConfig};
use mlbench_methods::Method;

#[test]
fn suite_config_defaults() {
    let cfg = SuiteConfig::default();
    assert!(cfg.timeout.is_none());
    assert!(!cfg.verbose);
    assert_eq!(cfg.isolate, None);
    assert!(cfg.runs.is_empty());
}

#[test]
fn suite_config_fills_missing_fields() {
    let cfg: SuiteConfig = serde_json::from_str(
        r#"{ "runs": [ { "method": "elastic_net", "datasets": ["a.csv", "b.csv"] } ] }"#,
    )
    .unwrap();
    assert_eq!(cfg.runs.len(), 1);
    assert_eq!(cfg.runs[0].method, Method::ElasticNet);
    assert_eq!(cfg.runs[0].options, "");
    assert_eq!(cfg.runs[0].datasets.len(), 2);
}

#[test]
fn bounded_suite_runs_use_workers_unless_opted_out() {
    let cfg: SuiteConfig = serde_json::from_str(
        r#"{ "timeout": 10, "runs": [
            { "method": "svm", "datasets": ["a.csv", "b.csv"] },
            { "method": "ann", "datasets": ["a.csv", "b.csv"], "timeout": 0 }
        ] }"#,
    )
    .unwrap();
    let requests = cfg.requests().unwrap();
    assert_eq!(placement(&requests[0], cfg.isolate), Placement::Worker);
    assert_eq!(placement(&requests[1], cfg.isolate), Placement::InProcess);

    let in_process: SuiteConfig = serde_json::from_str(
        r#"{ "timeout": 10, "isolate": false, "runs": [ { "method": "svm", "datasets": ["a.csv", "b.csv"] } ] }"#,
    )
    .unwrap();
    assert_eq!(in_process.isolate, Some(false));
    let requests = in_process.requests().unwrap();
    assert_eq!(placement(&requests[0], in_process.isolate), Placement::InProcess);
}

#[test]
fn run_timeout_overrides_suite_timeout() {
    let cfg: SuiteConfig = serde_json::from_str(
        r#"{ "timeout": 10, "runs": [
            { "method": "svm", "datasets": ["a.csv", "b.csv"] },
            { "method": "ann", "datasets": ["a.csv", "b.csv"], "timeout": 0 }
        ] }"#,
    )
    .unwrap();
    let requests = cfg.requests().unwrap();
    assert_eq!(requests[0].timeout, Some(Duration::from_secs(10)));
    assert_eq!(requests[1].timeout, None);
}

#[test]
fn negative_timeout_rejects_suite() {
    let cfg: SuiteConfig = serde_json::from_str(
        r#"{ "timeout": -2, "runs": [ { "method": "svm", "datasets": ["a.csv", "b.csv"] } ] }"#,
    )
    .unwrap();
    assert!(run_suite(&cfg, None).is_err());
}

#[test]
fn unknown_method_fails_to_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("suite.json");
    std::fs::write(&path, r#"{ "runs": [ { "method": "knn", "datasets": [] } ] }"#).unwrap();
    assert!(load_suite_config(&path).is_err());
}

#[test]
fn failed_runs_are_reported_not_raised() {
    let cfg: SuiteConfig = serde_json::from_str(
        r#"{ "runs": [
            { "method": "ann", "datasets": ["/nonexistent/train.csv", "/nonexistent/test.csv"] },
            { "method": "svm", "datasets": ["/nonexistent/train.csv"] }
        ] }"#,
    )
    .unwrap();
    let results = run_suite(&cfg, None).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.outcome.is_failure()));
}

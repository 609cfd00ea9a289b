//! Command line front end for mlbench: single runs, JSON suites and the
//! worker used for process-isolated runs.
pub mod run;
pub mod suite;

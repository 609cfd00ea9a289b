//! Typed benchmark configuration.
//!
//! Each method receives a free-form options string such as
//! `"-k linear -c 2.5 --max_iter 100"`. Known flags are picked out of the
//! string and parsed by a per-method `clap` command; anything else in the
//! string is ignored. Flags that are absent keep the value from the
//! config's `Default` impl.
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use clap::error::ContextKind;
use clap::{value_parser, Arg, ArgMatches, Command};
use serde::{Deserialize, Serialize};

use crate::error::BenchError;

/// The estimator families the harness can benchmark.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Ann,
    ElasticNet,
    Svm,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Ann, Method::ElasticNet, Method::Svm];

    /// Name used in logs and reports.
    pub fn display_name(self) -> &'static str {
        match self {
            Method::Ann => "ANN",
            Method::ElasticNet => "ElasticNet",
            Method::Svm => "SVM",
        }
    }

    /// Name accepted on the command line and in suite files.
    pub fn key(self) -> &'static str {
        match self {
            Method::Ann => "ann",
            Method::ElasticNet => "elastic_net",
            Method::Svm => "svm",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Method {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ann" | "lshforest" => Ok(Method::Ann),
            "elastic_net" | "elasticnet" | "elastic-net" => Ok(Method::ElasticNet),
            "svm" => Ok(Method::Svm),
            _ => Err(BenchError::UnknownMethod(s.to_string())),
        }
    }
}

/// Keep only the tokens of `options` that belong to flags `command` knows,
/// each followed by its value. `--flag=value` is kept as one token.
fn known_tokens(command: &Command, options: &str) -> Vec<String> {
    let mut flags = HashSet::new();
    for arg in command.get_arguments() {
        if let Some(short) = arg.get_short() {
            flags.insert(format!("-{}", short));
        }
        if let Some(long) = arg.get_long() {
            flags.insert(format!("--{}", long));
        }
    }

    let tokens: Vec<&str> = options.split_whitespace().collect();
    let mut kept = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if let Some((flag, _)) = token.split_once('=') {
            if flag.starts_with("--") && flags.contains(flag) {
                kept.push(token.to_string());
                i += 1;
                continue;
            }
        }
        if flags.contains(token) && i + 1 < tokens.len() {
            kept.push(token.to_string());
            kept.push(tokens[i + 1].to_string());
            i += 2;
            continue;
        }
        i += 1;
    }
    kept
}

/// Parse `options` against `command`.
pub fn parse_options(command: Command, options: &str) -> Result<ArgMatches, BenchError> {
    let command = command
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .allow_negative_numbers(true)
        .args_override_self(true);
    let tokens = known_tokens(&command, options);

    command.try_get_matches_from(tokens).map_err(|e| {
        let flag = e
            .get(ContextKind::InvalidArg)
            .map(|arg| arg.to_string())
            .unwrap_or_else(|| "options".to_string());
        let rendered = e.to_string();
        let message = rendered
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("error: ")
            .to_string();
        BenchError::invalid_option(flag, message)
    })
}

fn choice<T: FromStr<Err = BenchError>>(matches: &ArgMatches, id: &str) -> Result<Option<T>, BenchError> {
    matches
        .get_one::<String>(id)
        .map(|value| value.parse())
        .transpose()
}

fn ensure(condition: bool, flag: &str, message: &str) -> Result<(), BenchError> {
    if condition {
        Ok(())
    } else {
        Err(BenchError::invalid_option(flag, message))
    }
}

// ---------------------------------------------------------------------------
// ANN
// ---------------------------------------------------------------------------

/// Nearest-neighbour index backing the ANN benchmark.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NnAlgorithm {
    BallTree,
    KdTree,
    Linear,
}

impl FromStr for NnAlgorithm {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "balltree" | "ball_tree" => Ok(NnAlgorithm::BallTree),
            "kdtree" | "kd_tree" => Ok(NnAlgorithm::KdTree),
            "linear" | "brute" => Ok(NnAlgorithm::Linear),
            _ => Err(BenchError::invalid_option(
                "--algorithm",
                format!("{}. Must be one of balltree, kdtree or linear", s),
            )),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct AnnConfig {
    /// Number of trees in the forest. Kept for option compatibility.
    pub n_estimators: usize,
    /// Neighbours returned per query.
    pub n_neighbors: usize,
    /// Lowest hash length searched during candidate selection. Kept for
    /// option compatibility.
    pub min_hash_match: usize,
    /// Minimum candidates examined per tree; used as the index leaf size.
    pub n_candidates: usize,
    pub radius: f64,
    pub radius_cutoff_ratio: f64,
    pub algorithm: NnAlgorithm,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            n_estimators: 10,
            n_neighbors: 5,
            min_hash_match: 4,
            n_candidates: 10,
            radius: 1.0,
            radius_cutoff_ratio: 0.9,
            algorithm: NnAlgorithm::BallTree,
        }
    }
}

impl AnnConfig {
    pub fn command() -> Command {
        Command::new("ann")
            .arg(Arg::new("n_estimators").short('n').value_parser(value_parser!(usize)))
            .arg(Arg::new("n_neighbors").short('k').value_parser(value_parser!(usize)))
            .arg(Arg::new("min_hash_match").short('H').value_parser(value_parser!(usize)))
            .arg(Arg::new("n_candidates").long("n_candidates").value_parser(value_parser!(usize)))
            .arg(Arg::new("radius").long("radius").value_parser(value_parser!(f64)))
            .arg(
                Arg::new("radius_cutoff_ratio")
                    .long("radius_cutoff_ratio")
                    .value_parser(value_parser!(f64)),
            )
            .arg(
                Arg::new("algorithm")
                    .long("algorithm")
                    .value_parser(["balltree", "kdtree", "linear"]),
            )
    }

    pub fn from_options(options: &str) -> Result<Self, BenchError> {
        let matches = parse_options(Self::command(), options)?;
        let defaults = Self::default();
        let config = Self {
            n_estimators: matches.get_one("n_estimators").copied().unwrap_or(defaults.n_estimators),
            n_neighbors: matches.get_one("n_neighbors").copied().unwrap_or(defaults.n_neighbors),
            min_hash_match: matches
                .get_one("min_hash_match")
                .copied()
                .unwrap_or(defaults.min_hash_match),
            n_candidates: matches.get_one("n_candidates").copied().unwrap_or(defaults.n_candidates),
            radius: matches.get_one("radius").copied().unwrap_or(defaults.radius),
            radius_cutoff_ratio: matches
                .get_one("radius_cutoff_ratio")
                .copied()
                .unwrap_or(defaults.radius_cutoff_ratio),
            algorithm: choice(&matches, "algorithm")?.unwrap_or(defaults.algorithm),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        ensure(self.n_estimators >= 1, "-n", "must be at least 1")?;
        ensure(self.n_neighbors >= 1, "-k", "must be at least 1")?;
        ensure(self.min_hash_match >= 1, "-H", "must be at least 1")?;
        ensure(self.n_candidates >= 1, "--n_candidates", "must be at least 1")?;
        ensure(self.radius > 0.0, "--radius", "must be positive")?;
        ensure(
            (0.0..=1.0).contains(&self.radius_cutoff_ratio),
            "--radius_cutoff_ratio",
            "must lie between 0 and 1",
        )
    }
}

// ---------------------------------------------------------------------------
// Elastic net
// ---------------------------------------------------------------------------

/// Order in which coordinate descent visits the features.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Cyclic,
    Random,
}

impl FromStr for Selection {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cyclic" => Ok(Selection::Cyclic),
            "random" => Ok(Selection::Random),
            _ => Err(BenchError::invalid_option(
                "--selection",
                format!("{}. Must be either cyclic or random", s),
            )),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ElasticNetConfig {
    /// Overall regularisation strength.
    pub rho: f64,
    /// Share of the L1 penalty, in [0, 1].
    pub alpha: f64,
    pub max_iter: u32,
    pub tol: f64,
    pub selection: Selection,
    pub fit_intercept: bool,
}

impl Default for ElasticNetConfig {
    fn default() -> Self {
        Self {
            rho: 1.0,
            alpha: 0.5,
            max_iter: 1000,
            tol: 0.0001,
            selection: Selection::Cyclic,
            fit_intercept: true,
        }
    }
}

impl ElasticNetConfig {
    pub fn command() -> Command {
        Command::new("elastic_net")
            .arg(Arg::new("rho").short('r').value_parser(value_parser!(f64)))
            .arg(Arg::new("alpha").short('a').value_parser(value_parser!(f64)))
            .arg(Arg::new("max_iter").long("max_iter").value_parser(value_parser!(u32)))
            .arg(Arg::new("tol").long("tol").value_parser(value_parser!(f64)))
            .arg(
                Arg::new("selection")
                    .long("selection")
                    .value_parser(["cyclic", "random"]),
            )
    }

    pub fn from_options(options: &str) -> Result<Self, BenchError> {
        let matches = parse_options(Self::command(), options)?;
        let defaults = Self::default();
        let config = Self {
            rho: matches.get_one("rho").copied().unwrap_or(defaults.rho),
            alpha: matches.get_one("alpha").copied().unwrap_or(defaults.alpha),
            max_iter: matches.get_one("max_iter").copied().unwrap_or(defaults.max_iter),
            tol: matches.get_one("tol").copied().unwrap_or(defaults.tol),
            selection: choice(&matches, "selection")?.unwrap_or(defaults.selection),
            fit_intercept: defaults.fit_intercept,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        ensure(self.rho >= 0.0, "-r", "must not be negative")?;
        ensure((0.0..=1.0).contains(&self.alpha), "-a", "must lie between 0 and 1")?;
        ensure(self.max_iter >= 1, "--max_iter", "must be at least 1")?;
        ensure(self.tol > 0.0, "--tol", "must be positive")
    }
}

// ---------------------------------------------------------------------------
// SVM
// ---------------------------------------------------------------------------

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf,
    Poly,
}

impl FromStr for Kernel {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Kernel::Linear),
            "rbf" => Ok(Kernel::Rbf),
            "poly" => Ok(Kernel::Poly),
            _ => Err(BenchError::invalid_option(
                "-k",
                format!("{}. Valid options are: linear, rbf, poly", s),
            )),
        }
    }
}

/// Kernel coefficient; `Auto` resolves to `1 / n_features` at fit time.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    Auto,
    Value(f64),
}

impl Gamma {
    pub fn resolve(self, n_features: usize) -> f64 {
        match self {
            Gamma::Auto => 1.0 / n_features.max(1) as f64,
            Gamma::Value(gamma) => gamma,
        }
    }
}

fn parse_gamma(s: &str) -> Result<Gamma, String> {
    if s == "auto" {
        return Ok(Gamma::Auto);
    }
    match s.parse::<f64>() {
        Ok(gamma) if gamma > 0.0 && gamma.is_finite() => Ok(Gamma::Value(gamma)),
        _ => Err(format!("{} is neither 'auto' nor a positive number", s)),
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionFunctionShape {
    /// One model per class against the rest.
    Ovr,
    /// One model per pair of classes, majority vote.
    Ovo,
}

impl FromStr for DecisionFunctionShape {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ovr" => Ok(DecisionFunctionShape::Ovr),
            "ovo" => Ok(DecisionFunctionShape::Ovo),
            _ => Err(BenchError::invalid_option(
                "--decision_function_shape",
                format!("{}. Must be either ovr or ovo", s),
            )),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct SvmConfig {
    pub kernel: Kernel,
    pub c: f64,
    pub gamma: Gamma,
    pub degree: u32,
    /// Kernel cache size in MB. Kept for option compatibility.
    pub cache_size: f64,
    /// Solver iteration cap, -1 for none. Kept for option compatibility.
    pub max_iter: i64,
    pub decision_function_shape: DecisionFunctionShape,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::Rbf,
            c: 1.0,
            gamma: Gamma::Auto,
            degree: 3,
            cache_size: 200.0,
            max_iter: -1,
            decision_function_shape: DecisionFunctionShape::Ovr,
        }
    }
}

impl SvmConfig {
    pub fn command() -> Command {
        Command::new("svm")
            .arg(
                Arg::new("kernel")
                    .short('k')
                    .value_parser(["linear", "rbf", "poly"]),
            )
            .arg(Arg::new("c").short('c').value_parser(value_parser!(f64)))
            .arg(Arg::new("gamma").short('g').value_parser(parse_gamma))
            .arg(Arg::new("degree").long("degree").value_parser(value_parser!(u32)))
            .arg(Arg::new("cache_size").long("cache_size").value_parser(value_parser!(f64)))
            .arg(Arg::new("max_iter").long("max_iter").value_parser(value_parser!(i64)))
            .arg(
                Arg::new("decision_function_shape")
                    .long("decision_function_shape")
                    .value_parser(["ovr", "ovo"]),
            )
    }

    pub fn from_options(options: &str) -> Result<Self, BenchError> {
        let matches = parse_options(Self::command(), options)?;
        let defaults = Self::default();
        let config = Self {
            kernel: choice(&matches, "kernel")?.unwrap_or(defaults.kernel),
            c: matches.get_one("c").copied().unwrap_or(defaults.c),
            gamma: matches.get_one("gamma").copied().unwrap_or(defaults.gamma),
            degree: matches.get_one("degree").copied().unwrap_or(defaults.degree),
            cache_size: matches.get_one("cache_size").copied().unwrap_or(defaults.cache_size),
            max_iter: matches.get_one("max_iter").copied().unwrap_or(defaults.max_iter),
            decision_function_shape: choice(&matches, "decision_function_shape")?
                .unwrap_or(defaults.decision_function_shape),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        ensure(self.c > 0.0, "-c", "must be positive")?;
        ensure(self.degree >= 1, "--degree", "must be at least 1")?;
        ensure(self.cache_size > 0.0, "--cache_size", "must be positive")?;
        ensure(self.max_iter == -1 || self.max_iter > 0, "--max_iter", "must be positive or -1")
    }
}

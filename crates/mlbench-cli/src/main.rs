use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;

use mlbench_cli::run::{
    placement, run_request, timeout_from_secs, worker_timing, Placement, RunRequest, WORKER_SUBCOMMAND,
};
use mlbench_cli::suite::{load_suite_config, run_suite};
use mlbench_methods::{DatasetSpec, Method};

fn method_arg() -> Arg {
    Arg::new("method")
        .help("Method to benchmark: ann, elastic_net or svm")
        .required(true)
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .value_hint(ValueHint::Other)
}

fn datasets_arg() -> Arg {
    Arg::new("datasets")
        .short('d')
        .long("dataset")
        .help(
            "Dataset file, repeated in order: training data (last column is the label), \
             test features, and optionally the test labels",
        )
        .action(ArgAction::Append)
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn options_arg() -> Arg {
    Arg::new("options")
        .short('o')
        .long("options")
        .help("Method options, e.g. \"-k linear -c 2.0\". Unknown flags are ignored.")
        .allow_hyphen_values(true)
        .default_value("")
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or(
            "MLBENCH_LOG",
            "error,mlbench=info,mlbench_cli=info,mlbench_methods=info",
        ))
        .init();

    let matches = Command::new("mlbench")
        .version(clap::crate_version!())
        .author("Justin Sing <justincsing@gmail.com>")
        .about("Time-bounded benchmarks of ANN, elastic net and SVM estimators")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Benchmark one method and print the outcome as JSON")
                .arg(method_arg())
                .arg(datasets_arg())
                .arg(options_arg())
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .help("Timeout in seconds. 0 or absent runs without a bound.")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("isolate")
                        .long("isolate")
                        .help(
                            "Run the timed pass in a worker process that is killed on timeout. \
                             This is the default when a timeout is set.",
                        )
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("in_process")
                        .long("in-process")
                        .help("Run the timed pass on a thread of this process, even with a timeout.")
                        .conflicts_with("isolate")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .help("Log progress at info level.")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("suite")
                .about("Run every benchmark listed in a JSON suite file")
                .arg(
                    Arg::new("config")
                        .help("Path to the suite JSON file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .long("output")
                        .help("Path to write the JSON results. Defaults to stdout.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(Command::new("methods").about("List the supported methods"))
        .subcommand(
            Command::new(WORKER_SUBCOMMAND)
                .hide(true)
                .arg(method_arg())
                .arg(datasets_arg())
                .arg(options_arg()),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Written by {author-with-newline}Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("run", sub_m)) => handle_run(sub_m),
        Some(("suite", sub_m)) => handle_suite(sub_m),
        Some(("methods", _)) => {
            for method in Method::ALL {
                println!("{}\t{}", method.key(), method.display_name());
            }
            Ok(())
        }
        Some((WORKER_SUBCOMMAND, sub_m)) => handle_worker(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn method_from(matches: &ArgMatches) -> Result<Method> {
    let name: &String = matches
        .get_one("method")
        .context("Missing method argument")?;
    Method::from_str(name).map_err(anyhow::Error::msg)
}

fn dataset_files(matches: &ArgMatches) -> Vec<PathBuf> {
    matches
        .get_many::<PathBuf>("datasets")
        .map(|files| files.cloned().collect())
        .unwrap_or_default()
}

fn options_from(matches: &ArgMatches) -> String {
    matches
        .get_one::<String>("options")
        .cloned()
        .unwrap_or_default()
}

fn handle_run(matches: &ArgMatches) -> Result<()> {
    let request = RunRequest {
        method: method_from(matches)?,
        datasets: DatasetSpec::new(dataset_files(matches)),
        options: options_from(matches),
        timeout: timeout_from_secs(matches.get_one::<f64>("timeout").copied())?,
        verbose: matches.get_flag("verbose"),
    };
    log::info!(
        "[mlbench::run] {} on {} dataset file(s)",
        request.method,
        request.datasets.len()
    );

    let isolate = if matches.get_flag("isolate") {
        Some(true)
    } else if matches.get_flag("in_process") {
        Some(false)
    } else {
        None
    };
    let exe = match placement(&request, isolate) {
        Placement::Worker => {
            Some(std::env::current_exe().context("Failed to locate the mlbench binary")?)
        }
        Placement::InProcess => None,
    };
    let outcome = run_request(&request, isolate, exe.as_deref());
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn handle_suite(matches: &ArgMatches) -> Result<()> {
    let config_path: &PathBuf = matches
        .get_one("config")
        .context("Missing suite config path")?;
    log::info!("[mlbench::suite] Running suite from {:?}", config_path);

    let config = load_suite_config(config_path)?;
    let needs_worker = config
        .requests()?
        .iter()
        .any(|request| placement(request, config.isolate) == Placement::Worker);
    let exe = if needs_worker {
        Some(std::env::current_exe().context("Failed to locate the mlbench binary")?)
    } else {
        None
    };
    let results = run_suite(&config, exe.as_deref())?;
    let json = serde_json::to_string_pretty(&results)?;

    match matches.get_one::<PathBuf>("output_file") {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write results: {}", path.display()))?;
            log::info!("[mlbench::suite] Wrote {} results to {:?}", results.len(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn handle_worker(matches: &ArgMatches) -> Result<()> {
    let method = method_from(matches)?;
    let timing = worker_timing(method, dataset_files(matches), &options_from(matches));
    if timing.is_failure() {
        std::process::exit(1);
    }
    println!("{}", timing.secs());
    Ok(())
}

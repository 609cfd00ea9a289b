use std::time::Duration;

use crate::benchmark::{Benchmark, MethodBenchmark};
use crate::config::Method;
use crate::data_handling::DatasetSpec;
use crate::models::ann::AnnEstimator;
use crate::models::elastic_net::ElasticNetEstimator;
use crate::models::svm::SvmEstimator;

/// Build a boxed benchmark wrapper for `method` over `datasets`.
pub fn build_benchmark(
    method: Method,
    datasets: DatasetSpec,
    timeout: Option<Duration>,
    verbose: bool,
) -> Box<dyn MethodBenchmark> {
    match method {
        Method::Ann => Box::new(
            Benchmark::new(AnnEstimator, datasets)
                .with_timeout(timeout)
                .verbose(verbose),
        ),
        Method::ElasticNet => Box::new(
            Benchmark::new(ElasticNetEstimator, datasets)
                .with_timeout(timeout)
                .verbose(verbose),
        ),
        Method::Svm => Box::new(
            Benchmark::new(SvmEstimator, datasets)
                .with_timeout(timeout)
                .verbose(verbose),
        ),
    }
}

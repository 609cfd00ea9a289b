use anyhow::{Context, Result};
use linfa_nn::distance::L2Dist;
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour, NearestNeighbourIndex};
use ndarray::{Array1, Array2};

use crate::config::{AnnConfig, NnAlgorithm};
use crate::error::BenchError;
use crate::models::estimator::Estimator;
use crate::models::utils::{check_features, majority_vote};

/// Approximate nearest neighbours backed by a `linfa-nn` spatial index.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnEstimator;

/// Fitted ANN handle.
///
/// `linfa-nn` indices borrow the point set they are built on, so the handle
/// owns the points and the index is built against them for each query batch.
#[derive(Debug, Clone)]
pub struct AnnModel {
    points: Array2<f64>,
    labels: Array1<f64>,
    algorithm: NnAlgorithm,
    leaf_size: usize,
}

fn backend(algorithm: NnAlgorithm) -> CommonNearestNeighbour {
    match algorithm {
        NnAlgorithm::BallTree => CommonNearestNeighbour::BallTree,
        NnAlgorithm::KdTree => CommonNearestNeighbour::KdTree,
        NnAlgorithm::Linear => CommonNearestNeighbour::LinearSearch,
    }
}

impl AnnModel {
    pub fn n_points(&self) -> usize {
        self.points.nrows()
    }

    /// Indices of the `k` nearest training points for every row of `queries`,
    /// closest first.
    pub fn k_nearest(&self, queries: &Array2<f64>, k: usize) -> Result<Vec<Vec<usize>>> {
        check_features(self.points.ncols(), queries)?;
        let index = backend(self.algorithm)
            .from_batch_with_leaf_size(&self.points, self.leaf_size, L2Dist)
            .with_context(|| format!("Failed to build {:?} index", self.algorithm))?;

        queries
            .rows()
            .into_iter()
            .map(|query| {
                let hits = index
                    .k_nearest(query, k)
                    .context("Nearest neighbour query failed")?;
                Ok(hits.into_iter().map(|(_, idx)| idx).collect())
            })
            .collect()
    }
}

impl Estimator for AnnEstimator {
    type Config = AnnConfig;
    type Model = AnnModel;

    fn name(&self) -> &str {
        "ANN"
    }

    fn parse_options(&self, options: &str) -> Result<AnnConfig, BenchError> {
        AnnConfig::from_options(options)
    }

    fn build_model(
        &self,
        config: &AnnConfig,
        train: &Array2<f64>,
        labels: &Array1<f64>,
    ) -> Result<AnnModel> {
        if train.nrows() != labels.len() {
            return Err(BenchError::LengthMismatch {
                expected: train.nrows(),
                found: labels.len(),
            }
            .into());
        }
        log::trace!(
            "ANN index {:?} with leaf size {}; forest settings n_estimators={} min_hash_match={} radius={} radius_cutoff_ratio={} do not apply to it",
            config.algorithm,
            config.n_candidates,
            config.n_estimators,
            config.min_hash_match,
            config.radius,
            config.radius_cutoff_ratio
        );

        let model = AnnModel {
            points: train.to_owned(),
            labels: labels.to_owned(),
            algorithm: config.algorithm,
            leaf_size: config.n_candidates,
        };
        // Build once so a bad point set fails at fit time rather than at query time.
        backend(model.algorithm)
            .from_batch_with_leaf_size(&model.points, model.leaf_size, L2Dist)
            .with_context(|| format!("Failed to build {:?} index", model.algorithm))?;
        Ok(model)
    }

    /// Label each query point with the majority label of its neighbours.
    fn predict(&self, config: &AnnConfig, model: &AnnModel, test: &Array2<f64>) -> Result<Array1<f64>> {
        let neighbours = model.k_nearest(test, config.n_neighbors)?;
        let predicted = neighbours
            .iter()
            .map(|idx| {
                let votes: Vec<f64> = idx.iter().map(|&i| model.labels[i]).collect();
                majority_vote(&votes).unwrap_or(f64::NAN)
            })
            .collect();
        Ok(predicted)
    }
}

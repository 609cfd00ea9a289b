use anyhow::{Context, Result};
use linfa::prelude::*;
use linfa::Dataset;
use linfa_elasticnet::ElasticNet;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::config::{ElasticNetConfig, Selection};
use crate::error::BenchError;
use crate::models::estimator::Estimator;
use crate::models::utils::check_features;

/// Elastic net regression via coordinate descent (`linfa-elasticnet`).
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticNetEstimator;

/// linfa-elasticnet centres the targets but not the records, so the records
/// are centred here and the column means are kept to shift test rows the
/// same way.
pub struct ElasticNetModel {
    inner: ElasticNet<f64>,
    n_features: usize,
    /// Column permutation applied before fitting when selection is random.
    feature_order: Option<Vec<usize>>,
    /// Training column means in fitted order, zero without an intercept.
    offsets: Array1<f64>,
}

impl ElasticNetModel {
    /// Coefficients in the original feature order.
    pub fn coefficients(&self) -> Array1<f64> {
        let fitted = self.inner.hyperplane();
        match &self.feature_order {
            None => fitted.to_owned(),
            Some(order) => {
                let mut coefficients = Array1::zeros(self.n_features);
                for (position, &feature) in order.iter().enumerate() {
                    coefficients[feature] = fitted[position];
                }
                coefficients
            }
        }
    }

    /// Intercept on the uncentred features.
    pub fn intercept(&self) -> f64 {
        self.inner.intercept() - self.offsets.dot(self.inner.hyperplane())
    }

    /// Permute and centre `x` the way the training records were.
    fn arrange(&self, x: &Array2<f64>) -> Array2<f64> {
        let arranged = match &self.feature_order {
            Some(order) => x.select(Axis(1), order),
            None => x.to_owned(),
        };
        arranged - &self.offsets
    }
}

impl Estimator for ElasticNetEstimator {
    type Config = ElasticNetConfig;
    type Model = ElasticNetModel;

    fn name(&self) -> &str {
        "ElasticNet"
    }

    fn parse_options(&self, options: &str) -> Result<ElasticNetConfig, BenchError> {
        ElasticNetConfig::from_options(options)
    }

    fn build_model(
        &self,
        config: &ElasticNetConfig,
        train: &Array2<f64>,
        labels: &Array1<f64>,
    ) -> Result<ElasticNetModel> {
        if train.nrows() != labels.len() {
            return Err(BenchError::LengthMismatch {
                expected: train.nrows(),
                found: labels.len(),
            }
            .into());
        }

        // linfa always sweeps the coordinates in column order, so a random
        // visiting order is obtained by shuffling the columns.
        let feature_order = match config.selection {
            Selection::Cyclic => None,
            Selection::Random => {
                let mut order: Vec<usize> = (0..train.ncols()).collect();
                order.shuffle(&mut thread_rng());
                Some(order)
            }
        };
        let records = match &feature_order {
            Some(order) => train.select(Axis(1), order),
            None => train.to_owned(),
        };
        let offsets = if config.fit_intercept {
            records
                .mean_axis(Axis(0))
                .context("Elastic net needs at least one training row")?
        } else {
            Array1::zeros(records.ncols())
        };
        let dataset = Dataset::new(&records - &offsets, labels.to_owned());

        let inner = ElasticNet::params()
            .penalty(config.rho)
            .l1_ratio(config.alpha)
            .with_intercept(config.fit_intercept)
            .max_iterations(config.max_iter)
            .tolerance(config.tol)
            .fit(&dataset)
            .context("Elastic net fit failed")?;

        Ok(ElasticNetModel {
            inner,
            n_features: train.ncols(),
            feature_order,
            offsets,
        })
    }

    fn predict(
        &self,
        _config: &ElasticNetConfig,
        model: &ElasticNetModel,
        test: &Array2<f64>,
    ) -> Result<Array1<f64>> {
        check_features(model.n_features, test)?;
        let test = model.arrange(test);
        Ok(model.inner.predict(&test))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        // y = 2 * x0 + 1
        let x = array![[0.0, 0.3], [1.0, 0.1], [2.0, 0.7], [3.0, 0.2], [4.0, 0.9], [5.0, 0.4]];
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        (x, y)
    }

    #[test]
    fn test_weak_penalty_recovers_line() {
        let (x, y) = linear_data();
        let config = ElasticNetConfig {
            rho: 0.001,
            max_iter: 10_000,
            tol: 1e-8,
            ..ElasticNetConfig::default()
        };
        let model = ElasticNetEstimator.build_model(&config, &x, &y).unwrap();
        let predicted = ElasticNetEstimator.predict(&config, &model, &x).unwrap();
        for (p, t) in predicted.iter().zip(y.iter()) {
            assert!((p - t).abs() < 0.1, "predicted {} expected {}", p, t);
        }
        assert!((model.coefficients()[0] - 2.0).abs() < 0.1);
        assert!((model.intercept() - 1.0).abs() < 0.2, "{}", model.intercept());
    }

    #[test]
    fn test_features_far_from_origin() {
        // y = 2 * (x0 - 100) + 1, so the intercept is -199
        let x = array![
            [100.0, 0.3],
            [101.0, 0.1],
            [102.0, 0.7],
            [103.0, 0.2],
            [104.0, 0.9],
            [105.0, 0.4]
        ];
        let y = x.column(0).mapv(|v| 2.0 * (v - 100.0) + 1.0);
        let config = ElasticNetConfig {
            rho: 0.001,
            max_iter: 10_000,
            tol: 1e-8,
            ..ElasticNetConfig::default()
        };
        let model = ElasticNetEstimator.build_model(&config, &x, &y).unwrap();
        let predicted = ElasticNetEstimator.predict(&config, &model, &x).unwrap();
        for (p, t) in predicted.iter().zip(y.iter()) {
            assert!((p - t).abs() < 0.1, "predicted {} expected {}", p, t);
        }
        assert!((model.coefficients()[0] - 2.0).abs() < 0.1, "{:?}", model.coefficients());
        assert!((model.intercept() + 199.0).abs() < 1.0, "{}", model.intercept());
    }

    #[test]
    fn test_without_intercept_records_are_not_centred() {
        // y = 3 * x0 passes through the origin
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]];
        let y = x.column(0).mapv(|v| 3.0 * v);
        let config = ElasticNetConfig {
            rho: 0.001,
            max_iter: 10_000,
            tol: 1e-8,
            fit_intercept: false,
            ..ElasticNetConfig::default()
        };
        let model = ElasticNetEstimator.build_model(&config, &x, &y).unwrap();
        assert_eq!(model.intercept(), 0.0);
        let predicted = ElasticNetEstimator.predict(&config, &model, &x).unwrap();
        for (p, t) in predicted.iter().zip(y.iter()) {
            assert!((p - t).abs() < 0.1, "predicted {} expected {}", p, t);
        }
    }

    #[test]
    fn test_random_selection_keeps_feature_order() {
        let (x, y) = linear_data();
        let config = ElasticNetConfig {
            rho: 0.001,
            max_iter: 10_000,
            tol: 1e-8,
            selection: Selection::Random,
            ..ElasticNetConfig::default()
        };
        let model = ElasticNetEstimator.build_model(&config, &x, &y).unwrap();
        let coefficients = model.coefficients();
        assert_eq!(coefficients.len(), 2);
        assert!((coefficients[0] - 2.0).abs() < 0.1, "{:?}", coefficients);
        let predicted = ElasticNetEstimator.predict(&config, &model, &x).unwrap();
        assert!((predicted[0] - 1.0).abs() < 0.2);
    }

    #[test]
    fn test_wrong_feature_count() {
        let (x, y) = linear_data();
        let config = ElasticNetConfig::default();
        let model = ElasticNetEstimator.build_model(&config, &x, &y).unwrap();
        assert!(ElasticNetEstimator
            .predict(&config, &model, &array![[1.0, 2.0, 3.0]])
            .is_err());
    }
}

use anyhow::{bail, Context, Result};
use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_svm::{Svm, SvmParams};
use ndarray::{Array1, Array2, Axis};

use crate::config::{DecisionFunctionShape, Kernel, SvmConfig};
use crate::error::BenchError;
use crate::models::estimator::Estimator;
use crate::models::utils::{argmax, check_features, LabelEncoder};

/// Support vector classification with `linfa-svm`.
///
/// linfa's SVM is a binary classifier, so multi-class problems are split
/// into one-vs-rest or one-vs-one sub-problems.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvmEstimator;

/// One binary machine. For one-vs-rest `negative` is `None` and the machine
/// separates `positive` from every other class.
struct Machine {
    positive: usize,
    negative: Option<usize>,
    svm: Svm<f64, Pr>,
}

pub struct SvmModel {
    encoder: LabelEncoder,
    n_features: usize,
    shape: DecisionFunctionShape,
    machines: Vec<Machine>,
}

impl SvmModel {
    pub fn classes(&self) -> &[f64] {
        self.encoder.classes()
    }

    pub fn n_machines(&self) -> usize {
        self.machines.len()
    }
}

fn svm_params(config: &SvmConfig, n_features: usize) -> SvmParams<f64, Pr> {
    let params = Svm::<f64, Pr>::params().pos_neg_weights(config.c, config.c);
    match config.kernel {
        Kernel::Linear => params.linear_kernel(),
        // linfa's gaussian kernel is exp(-|x - y|^2 / eps)
        Kernel::Rbf => params.gaussian_kernel(1.0 / config.gamma.resolve(n_features)),
        Kernel::Poly => params.polynomial_kernel(0.0, config.degree as f64),
    }
}

fn fit_binary(params: &SvmParams<f64, Pr>, records: Array2<f64>, targets: Array1<bool>) -> Result<Svm<f64, Pr>> {
    let dataset = Dataset::new(records, targets);
    <SvmParams<f64, Pr> as Fit<_, _, _>>::fit(params, &dataset).context("SVM fit failed")
}

/// Probability that each row belongs to the machine's positive side.
fn positive_probabilities(svm: &Svm<f64, Pr>, test: &Array2<f64>) -> Array1<f64> {
    let probabilities: Array1<Pr> = svm.predict(test);
    probabilities.mapv(|p| *p as f64)
}

impl Estimator for SvmEstimator {
    type Config = SvmConfig;
    type Model = SvmModel;

    fn name(&self) -> &str {
        "SVM"
    }

    fn parse_options(&self, options: &str) -> Result<SvmConfig, BenchError> {
        SvmConfig::from_options(options)
    }

    fn build_model(&self, config: &SvmConfig, train: &Array2<f64>, labels: &Array1<f64>) -> Result<SvmModel> {
        if train.nrows() != labels.len() {
            return Err(BenchError::LengthMismatch {
                expected: train.nrows(),
                found: labels.len(),
            }
            .into());
        }

        let encoder = LabelEncoder::fit(labels);
        let n_classes = encoder.n_classes();
        if n_classes < 2 {
            bail!("SVM needs at least two classes, found {}", n_classes);
        }
        let encoded = encoder.encode(labels)?;
        let params = svm_params(config, train.ncols());
        log::trace!(
            "SVM {:?} kernel over {} classes ({:?}); cache_size={} max_iter={} are not used by linfa-svm",
            config.kernel,
            n_classes,
            config.decision_function_shape,
            config.cache_size,
            config.max_iter
        );

        let mut machines = Vec::new();
        match config.decision_function_shape {
            DecisionFunctionShape::Ovr => {
                for class in 0..n_classes {
                    let targets = encoded.mapv(|c| c == class);
                    let svm = fit_binary(&params, train.to_owned(), targets)?;
                    machines.push(Machine {
                        positive: class,
                        negative: None,
                        svm,
                    });
                }
            }
            DecisionFunctionShape::Ovo => {
                for positive in 0..n_classes {
                    for negative in positive + 1..n_classes {
                        let rows: Vec<usize> = encoded
                            .iter()
                            .enumerate()
                            .filter(|(_, &c)| c == positive || c == negative)
                            .map(|(row, _)| row)
                            .collect();
                        let records = train.select(Axis(0), &rows);
                        let targets = rows.iter().map(|&row| encoded[row] == positive).collect();
                        let svm = fit_binary(&params, records, targets)?;
                        machines.push(Machine {
                            positive,
                            negative: Some(negative),
                            svm,
                        });
                    }
                }
            }
        }

        Ok(SvmModel {
            encoder,
            n_features: train.ncols(),
            shape: config.decision_function_shape,
            machines,
        })
    }

    fn predict(&self, _config: &SvmConfig, model: &SvmModel, test: &Array2<f64>) -> Result<Array1<f64>> {
        check_features(model.n_features, test)?;
        let n_classes = model.encoder.n_classes();
        let mut scores = Array2::<f64>::zeros((test.nrows(), n_classes));

        for machine in &model.machines {
            let probabilities = positive_probabilities(&machine.svm, test);
            match (model.shape, machine.negative) {
                (DecisionFunctionShape::Ovr, _) | (_, None) => {
                    scores.column_mut(machine.positive).assign(&probabilities);
                }
                (DecisionFunctionShape::Ovo, Some(negative)) => {
                    for (row, &p) in probabilities.iter().enumerate() {
                        let winner = if p >= 0.5 { machine.positive } else { negative };
                        scores[[row, winner]] += 1.0;
                    }
                }
            }
        }

        let predicted = scores
            .rows()
            .into_iter()
            .map(|row| {
                let scores = row.to_vec();
                argmax(&scores).map(|class| model.encoder.decode(class)).unwrap_or(f64::NAN)
            })
            .collect();
        Ok(predicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Gamma;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [0.3, 0.2],
            [5.0, 5.0],
            [5.2, 5.1],
            [5.1, 5.3],
            [5.3, 5.2],
            [0.0, 5.0],
            [0.2, 5.1],
            [0.1, 5.3],
            [0.3, 5.2],
        ];
        let y = array![1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0];
        (x, y)
    }

    fn accuracy(predicted: &Array1<f64>, truth: &Array1<f64>) -> f64 {
        let correct = predicted.iter().zip(truth.iter()).filter(|(p, t)| p == t).count();
        correct as f64 / truth.len() as f64
    }

    #[test]
    fn test_one_vs_rest_linear() {
        let (x, y) = separable();
        let config = SvmConfig {
            kernel: Kernel::Linear,
            c: 10.0,
            ..SvmConfig::default()
        };
        let model = SvmEstimator.build_model(&config, &x, &y).unwrap();
        assert_eq!(model.classes(), &[1.0, 2.0, 3.0]);
        assert_eq!(model.n_machines(), 3);
        let predicted = SvmEstimator.predict(&config, &model, &x).unwrap();
        assert_eq!(predicted, y);
    }

    #[test]
    fn test_one_vs_rest_scores_held_out_points() {
        let (x, y) = separable();
        let config = SvmConfig {
            kernel: Kernel::Linear,
            c: 10.0,
            ..SvmConfig::default()
        };
        let model = SvmEstimator.build_model(&config, &x, &y).unwrap();
        let held_out = array![[0.15, 0.15], [5.15, 5.15], [0.15, 5.15]];
        let predicted = SvmEstimator.predict(&config, &model, &held_out).unwrap();
        assert_eq!(predicted, array![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_one_vs_one_gaussian() {
        let (x, y) = separable();
        let config = SvmConfig {
            kernel: Kernel::Rbf,
            gamma: Gamma::Value(0.5),
            c: 10.0,
            decision_function_shape: DecisionFunctionShape::Ovo,
            ..SvmConfig::default()
        };
        let model = SvmEstimator.build_model(&config, &x, &y).unwrap();
        assert_eq!(model.n_machines(), 3);
        let predicted = SvmEstimator.predict(&config, &model, &x).unwrap();
        assert_eq!(accuracy(&predicted, &y), 1.0, "{:?}", predicted);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        let y = array![1.0, 1.0];
        assert!(SvmEstimator.build_model(&SvmConfig::default(), &x, &y).is_err());
    }

    #[test]
    fn test_wrong_feature_count() {
        let (x, y) = separable();
        let config = SvmConfig {
            kernel: Kernel::Linear,
            ..SvmConfig::default()
        };
        let model = SvmEstimator.build_model(&config, &x, &y).unwrap();
        assert!(SvmEstimator.predict(&config, &model, &array![[1.0]]).is_err());
    }
}

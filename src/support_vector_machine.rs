use std::fmt;

use nalgebra::{DMatrix, DVector};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::activation::argmax_rows;
use crate::classifier::Classifier;
use crate::error::ModelError;
use crate::logistic_regression::check_labels;

/// Rows per kernel block when scoring; bounds the block to `CHUNK_ROWS x n_support`.
const CHUNK_ROWS: usize = 1024;

/// Dual coefficients at or below this magnitude are not support vectors.
const SUPPORT_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelType {
    Linear,
    Polynomial {
        degree: u32,
    },
    /// `gamma: None` means `1 / n_features`.
    Rbf {
        #[serde(default)]
        gamma: Option<f64>,
    },
}

impl KernelType {
    pub fn resolve(self, n_features: usize) -> Self {
        match self {
            KernelType::Rbf { gamma: None } => KernelType::Rbf {
                gamma: Some(1.0 / n_features.max(1) as f64),
            },
            kernel => kernel,
        }
    }

    /// `K[i, j] = k(left_i, right_j)` over the rows of both matrices.
    pub fn matrix(&self, left: &DMatrix<f64>, right: &DMatrix<f64>) -> DMatrix<f64> {
        let dots = left * right.transpose();

        match *self {
            KernelType::Linear => dots,
            KernelType::Polynomial { degree } => {
                let exponent = i32::try_from(degree).unwrap_or(i32::MAX);
                dots.map(|dot| dot.powi(exponent))
            }
            KernelType::Rbf { gamma } => {
                let gamma = gamma.unwrap_or(1.0 / left.ncols().max(1) as f64);
                let left_norms: Vec<f64> = left.row_iter().map(|row| row.norm_squared()).collect();
                let right_norms: Vec<f64> =
                    right.row_iter().map(|row| row.norm_squared()).collect();

                DMatrix::from_fn(left.nrows(), right.nrows(), |i, j| {
                    let distance = (left_norms[i] + right_norms[j] - 2.0 * dots[(i, j)]).max(0.0);
                    (-gamma * distance).exp()
                })
            }
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelType::Linear => write!(f, "Linear Kernel"),
            KernelType::Polynomial { degree } => write!(f, "Polynomial Kernel - Degree = {degree}"),
            KernelType::Rbf { gamma: Some(gamma) } => write!(f, "RBF Kernel - Gamma = {gamma}"),
            KernelType::Rbf { gamma: None } => write!(f, "RBF Kernel - Gamma = auto"),
        }
    }
}

/// Simplified sequential minimal optimization for the binary soft-margin dual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoSolver {
    pub regularization: f64,
    pub tolerance: f64,
    /// Consecutive sweeps without any update before stopping.
    pub max_passes: usize,
    /// Hard cap on sweeps over the samples.
    pub max_sweeps: usize,
}

#[derive(Debug, Clone)]
pub struct DualSolution {
    pub alphas: DVector<f64>,
    pub bias: f64,
    /// Mean hinge loss after every sweep.
    pub risks: Vec<f64>,
}

impl SmoSolver {
    /// Solves for labels in `{-1, +1}` given the precomputed Gram matrix.
    #[allow(clippy::similar_names)]
    pub fn solve(&self, gram: &DMatrix<f64>, labels: &DVector<f64>) -> DualSolution {
        let n = labels.len();
        let c = self.regularization;

        let mut alphas: DVector<f64> = DVector::zeros(n);
        // alpha_i * y_i, kept in step with `alphas`
        let mut weighted: DVector<f64> = DVector::zeros(n);
        let mut bias = 0.0;
        let mut risks = Vec::new();

        let mut passes = 0;
        let mut sweeps = 0;

        while passes < self.max_passes && sweeps < self.max_sweeps {
            sweeps += 1;
            let mut changed = 0;

            for i in 0..n {
                let error_i = gram.column(i).dot(&weighted) + bias - labels[i];
                let residual = labels[i] * error_i;
                let violates = (residual < -self.tolerance && alphas[i] < c)
                    || (residual > self.tolerance && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let j = (i + 1) % n;
                if j == i {
                    continue;
                }
                let error_j = gram.column(j).dot(&weighted) + bias - labels[j];

                let previous_i = alphas[i];
                let previous_j = alphas[j];

                let (low, high) = if (labels[i] - labels[j]).abs() > f64::EPSILON {
                    (
                        f64::max(0.0, previous_j - previous_i),
                        f64::min(c, c + previous_j - previous_i),
                    )
                } else {
                    (
                        f64::max(0.0, previous_i + previous_j - c),
                        f64::min(c, previous_i + previous_j),
                    )
                };
                if low >= high {
                    continue;
                }

                let eta = 2.0 * gram[(i, j)] - gram[(i, i)] - gram[(j, j)];
                if eta >= 0.0 {
                    continue;
                }

                let alpha_j =
                    (previous_j - labels[j] * (error_i - error_j) / eta).clamp(low, high);
                if (alpha_j - previous_j).abs() < 1e-5 {
                    continue;
                }
                let alpha_i = previous_i + labels[i] * labels[j] * (previous_j - alpha_j);

                let delta_i = labels[i] * (alpha_i - previous_i);
                let delta_j = labels[j] * (alpha_j - previous_j);
                let bias_i = bias - error_i - delta_i * gram[(i, i)] - delta_j * gram[(i, j)];
                let bias_j = bias - error_j - delta_i * gram[(i, j)] - delta_j * gram[(j, j)];

                bias = if 0.0 < alpha_i && alpha_i < c {
                    bias_i
                } else if 0.0 < alpha_j && alpha_j < c {
                    bias_j
                } else {
                    (bias_i + bias_j) / 2.0
                };

                alphas[i] = alpha_i;
                alphas[j] = alpha_j;
                weighted[i] = alpha_i * labels[i];
                weighted[j] = alpha_j * labels[j];
                changed += 1;
            }

            if changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }

            risks.push(empirical_risk(gram, labels, &weighted, bias));
        }

        if sweeps >= self.max_sweeps && passes < self.max_passes {
            log::warn!("SMO stopped after {sweeps} sweeps before settling");
        }

        DualSolution {
            alphas,
            bias,
            risks,
        }
    }
}

fn empirical_risk(
    gram: &DMatrix<f64>,
    labels: &DVector<f64>,
    weighted: &DVector<f64>,
    bias: f64,
) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }

    // gram is symmetric, so entry i of `gram * weighted` is f(x_i) - bias
    let decisions = gram * weighted;
    let total: f64 = decisions
        .iter()
        .zip(labels.iter())
        .map(|(&f, &y)| f64::max(0.0, 1.0 - y * (f + bias)))
        .sum();

    total / labels.len() as f64
}

fn to_dmatrix(data: ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(data.nrows(), data.ncols(), |i, j| data[[i, j]])
}

/// One-vs-rest kernel machine sharing one set of support vectors.
#[derive(Debug, Clone)]
pub struct SupportVectorMachine {
    kernel: KernelType,
    support_vectors: DMatrix<f64>,
    /// `alpha * y` per support vector (row) and class (column).
    coefficients: DMatrix<f64>,
    biases: DVector<f64>,
}

impl SupportVectorMachine {
    /// Fits one binary machine per class and returns the model with each
    /// machine's risk history.
    pub fn fit(
        data: ArrayView2<f64>,
        labels: ArrayView1<usize>,
        n_classes: usize,
        kernel: KernelType,
        solver: &SmoSolver,
    ) -> Result<(Self, Vec<Vec<f64>>), ModelError> {
        if data.nrows() == 0 {
            return Err(ModelError::Empty);
        }
        if data.nrows() != labels.len() {
            return Err(ModelError::LabelCountMismatch {
                rows: data.nrows(),
                labels: labels.len(),
            });
        }
        check_labels(labels, n_classes)?;

        let kernel = kernel.resolve(data.ncols());
        let samples = to_dmatrix(data);
        let gram = kernel.matrix(&samples, &samples);
        log::info!(
            "fitting {kernel} on {} samples, C = {}",
            samples.nrows(),
            solver.regularization
        );

        let mut coefficients = DMatrix::zeros(samples.nrows(), n_classes);
        let mut biases = DVector::zeros(n_classes);
        let mut histories = Vec::with_capacity(n_classes);

        for class in 0..n_classes {
            let targets = DVector::from_iterator(
                labels.len(),
                labels
                    .iter()
                    .map(|&label| if label == class { 1.0 } else { -1.0 }),
            );
            if targets.iter().all(|&y| y < 0.0) {
                log::warn!("class {class} has no samples in the SVM training set");
            }

            let solution = solver.solve(&gram, &targets);
            coefficients
                .column_mut(class)
                .copy_from(&solution.alphas.component_mul(&targets));
            biases[class] = solution.bias;
            histories.push(solution.risks);
        }

        let support: Vec<usize> = (0..samples.nrows())
            .filter(|&row| {
                coefficients
                    .row(row)
                    .iter()
                    .any(|c| c.abs() > SUPPORT_EPSILON)
            })
            .collect();
        log::info!("{} support vectors", support.len());

        Ok((
            Self {
                kernel,
                support_vectors: samples.select_rows(support.iter()),
                coefficients: coefficients.select_rows(support.iter()),
                biases,
            },
            histories,
        ))
    }

    pub fn kernel(&self) -> KernelType {
        self.kernel
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.nrows()
    }

    /// `N x K` decision values, computed in row blocks.
    pub fn decision_function(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        if data.ncols() != self.support_vectors.ncols() {
            return Err(ModelError::ShapeMismatch {
                expected: vec![data.nrows(), self.support_vectors.ncols()],
                found: vec![data.nrows(), data.ncols()],
            });
        }

        let n_classes = self.biases.len();
        let mut scores = Array2::zeros((data.nrows(), n_classes));

        for start in (0..data.nrows()).step_by(CHUNK_ROWS) {
            let end = (start + CHUNK_ROWS).min(data.nrows());
            let block = to_dmatrix(data.slice(s![start..end, ..]));
            let decisions =
                self.kernel.matrix(&block, &self.support_vectors) * &self.coefficients;

            for row in 0..decisions.nrows() {
                for class in 0..n_classes {
                    scores[[start + row, class]] = decisions[(row, class)] + self.biases[class];
                }
            }
        }

        Ok(scores)
    }
}

impl Classifier for SupportVectorMachine {
    fn name(&self) -> &str {
        "support vector machine"
    }

    fn predict(&self, data: ArrayView2<f64>) -> Result<Array1<usize>, ModelError> {
        Ok(argmax_rows(self.decision_function(data)?.view()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn solver(regularization: f64) -> SmoSolver {
        SmoSolver {
            regularization,
            tolerance: 1e-3,
            max_passes: 5,
            max_sweeps: 50,
        }
    }

    fn clusters() -> (Array2<f64>, Array1<usize>) {
        (
            array![
                [0.0, 0.0],
                [0.2, 0.1],
                [0.1, 0.2],
                [3.0, 3.0],
                [3.2, 2.9],
                [2.9, 3.1],
                [0.0, 3.0],
                [0.1, 3.2],
                [-0.1, 2.9]
            ],
            array![0, 0, 0, 1, 1, 1, 2, 2, 2],
        )
    }

    #[test]
    fn linear_kernel_is_dot_product() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);

        let gram = KernelType::Linear.matrix(&a, &a);

        assert_eq!(gram, DMatrix::from_row_slice(2, 2, &[5.0, 11.0, 11.0, 25.0]));
    }

    #[test]
    fn polynomial_kernel_raises_dot_product() {
        let a = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let b = DMatrix::from_row_slice(1, 2, &[3.0, 1.0]);

        let k = KernelType::Polynomial { degree: 2 }.matrix(&a, &b);

        assert_abs_diff_eq!(k[(0, 0)], 25.0);
    }

    #[test]
    fn rbf_kernel_matches_distance_formula() {
        let a = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 2.0]);
        let kernel = KernelType::Rbf { gamma: Some(0.5) };

        let gram = kernel.matrix(&a, &a);

        assert_abs_diff_eq!(gram[(0, 0)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gram[(1, 1)], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gram[(0, 1)], (-2.5f64).exp(), epsilon = 1e-12);
        assert_abs_diff_eq!(gram[(1, 0)], gram[(0, 1)], epsilon = 1e-12);
    }

    #[test]
    fn automatic_gamma_uses_feature_count() {
        assert_eq!(
            KernelType::Rbf { gamma: None }.resolve(4),
            KernelType::Rbf { gamma: Some(0.25) }
        );
        assert_eq!(KernelType::Linear.resolve(4), KernelType::Linear);
    }

    #[test]
    fn kernel_headers() {
        assert_eq!(KernelType::Linear.to_string(), "Linear Kernel");
        assert_eq!(
            KernelType::Rbf { gamma: Some(1.0) }.to_string(),
            "RBF Kernel - Gamma = 1"
        );
        assert_eq!(
            KernelType::Rbf { gamma: None }.to_string(),
            "RBF Kernel - Gamma = auto"
        );
    }

    #[test]
    fn smo_separates_one_dimensional_data() {
        let samples = DMatrix::from_row_slice(4, 1, &[-2.0, -1.0, 1.0, 2.0]);
        let labels = DVector::from_vec(vec![-1.0, -1.0, 1.0, 1.0]);
        let gram = KernelType::Linear.matrix(&samples, &samples);

        let solution = solver(1.0).solve(&gram, &labels);
        let weighted = solution.alphas.component_mul(&labels);
        let decisions = &gram * &weighted;

        for (i, &y) in labels.iter().enumerate() {
            assert!(y * (decisions[i] + solution.bias) > 0.0);
        }
        assert!(solution.alphas.iter().all(|&a| (0.0..=1.0).contains(&a)));
        assert_abs_diff_eq!(*solution.risks.last().unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn rbf_machine_classifies_clusters() {
        let (data, labels) = clusters();

        let (machine, histories) = SupportVectorMachine::fit(
            data.view(),
            labels.view(),
            3,
            KernelType::Rbf { gamma: Some(1.0) },
            &solver(1.0),
        )
        .unwrap();

        assert_eq!(histories.len(), 3);
        assert!(machine.n_support() > 0);
        assert_eq!(machine.predict(data.view()).unwrap(), labels);

        let nearby = array![[0.05, 0.05], [3.1, 3.0], [0.0, 3.1]];
        assert_eq!(machine.predict(nearby.view()).unwrap(), array![0, 1, 2]);
    }

    #[test]
    fn prediction_rejects_wrong_feature_count() {
        let (data, labels) = clusters();
        let (machine, _) = SupportVectorMachine::fit(
            data.view(),
            labels.view(),
            3,
            KernelType::Linear,
            &solver(1.0),
        )
        .unwrap();

        assert!(matches!(
            machine.predict(Array2::zeros((2, 3)).view()),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn fit_rejects_label_mismatch() {
        let (data, _) = clusters();

        let error = SupportVectorMachine::fit(
            data.view(),
            array![0, 1].view(),
            3,
            KernelType::Linear,
            &solver(1.0),
        )
        .unwrap_err();

        assert!(matches!(error, ModelError::LabelCountMismatch { .. }));
    }
}

//! Multi-class (softmax) logistic regression over all classes at once.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip};

use crate::activation::{argmax_rows, softmax_rows, PROBABILITY_FLOOR};
use crate::classifier::Classifier;
use crate::error::ModelError;
use crate::gradient_descent::{GradientDescent, Minimum};
use crate::logistic_regression::check_labels;
use crate::objective::{affine_gradient, affine_scores, check_weight_rows, Objective};

/// `N x K` indicator matrix with a single 1.0 per row.
pub fn one_hot(labels: ArrayView1<usize>, n_classes: usize) -> Result<Array2<f64>, ModelError> {
    check_labels(labels, n_classes)?;

    let mut targets = Array2::zeros((labels.len(), n_classes));
    for (row, &label) in labels.iter().enumerate() {
        targets[[row, label]] = 1.0;
    }
    Ok(targets)
}

/// Mean categorical cross-entropy.
///
/// Parameters are the `(D + 1) x K` weight matrix flattened row-major, so
/// entry `i * K + k` is feature `i`'s weight for class `k` (row 0 = bias).
pub struct MultinomialLogisticObjective<'a> {
    data: ArrayView2<'a, f64>,
    targets: Array2<f64>,
}

impl<'a> MultinomialLogisticObjective<'a> {
    pub fn new(data: ArrayView2<'a, f64>, targets: Array2<f64>) -> Result<Self, ModelError> {
        if data.nrows() == 0 || targets.ncols() == 0 {
            return Err(ModelError::Empty);
        }
        if data.nrows() != targets.nrows() {
            return Err(ModelError::LabelCountMismatch {
                rows: data.nrows(),
                labels: targets.nrows(),
            });
        }

        Ok(Self { data, targets })
    }

    pub fn from_labels(
        data: ArrayView2<'a, f64>,
        labels: ArrayView1<usize>,
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        Self::new(data, one_hot(labels, n_classes)?)
    }

    pub fn n_classes(&self) -> usize {
        self.targets.ncols()
    }

    fn weight_shape(&self) -> (usize, usize) {
        (self.data.ncols() + 1, self.n_classes())
    }
}

impl Objective for MultinomialLogisticObjective<'_> {
    fn dimension(&self) -> usize {
        let (rows, cols) = self.weight_shape();
        rows * cols
    }

    fn evaluate(&self, params: ArrayView1<f64>) -> Result<(f64, Array1<f64>), ModelError> {
        if params.len() != self.dimension() {
            return Err(ModelError::ShapeMismatch {
                expected: vec![self.dimension()],
                found: vec![params.len()],
            });
        }
        let n_rows = self.data.nrows() as f64;
        let weights = params.to_shape(self.weight_shape())?;

        let theta = softmax_rows(affine_scores(self.data, weights.view())?.view());

        let mut log_likelihood = 0.0;
        Zip::from(&theta).and(&self.targets).for_each(|&t, &y| {
            log_likelihood += y * t.max(PROBABILITY_FLOOR).ln();
        });
        let loss = -log_likelihood / n_rows;

        let residuals = theta - &self.targets;
        let gradient = affine_gradient(self.data, residuals.view());

        Ok((loss, gradient.iter().copied().collect()))
    }
}

pub fn predict_softmax(
    weights: ArrayView2<f64>,
    data: ArrayView2<f64>,
) -> Result<Array1<usize>, ModelError> {
    let scores = affine_scores(data, weights)?;
    Ok(argmax_rows(softmax_rows(scores.view()).view()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoftmaxRegression {
    weights: Array2<f64>,
}

impl SoftmaxRegression {
    pub fn new(weights: Array2<f64>) -> Self {
        Self { weights }
    }

    pub fn from_flat(
        params: Array1<f64>,
        n_features: usize,
        n_classes: usize,
    ) -> Result<Self, ModelError> {
        if params.len() != (n_features + 1) * n_classes {
            return Err(ModelError::ShapeMismatch {
                expected: vec![(n_features + 1) * n_classes],
                found: vec![params.len()],
            });
        }
        let weights = params.into_shape_with_order((n_features + 1, n_classes))?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> ArrayView2<f64> {
        self.weights.view()
    }

    pub fn probabilities(&self, data: ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        Ok(softmax_rows(affine_scores(data, self.weights.view())?.view()))
    }

    pub fn train(
        data: ArrayView2<f64>,
        labels: ArrayView1<usize>,
        n_classes: usize,
        optimizer: &GradientDescent,
    ) -> Result<(Self, Vec<f64>), ModelError> {
        let objective = MultinomialLogisticObjective::from_labels(data, labels, n_classes)?;
        let Minimum { params, losses, .. } =
            optimizer.minimize(&objective, Array1::zeros(objective.dimension()))?;

        log::info!(
            "softmax regression: loss {:.6} after {} iterations",
            losses.last().copied().unwrap_or(f64::NAN),
            losses.len()
        );

        Ok((Self::from_flat(params, data.ncols(), n_classes)?, losses))
    }
}

impl Classifier for SoftmaxRegression {
    fn name(&self) -> &str {
        "softmax regression"
    }

    fn predict(&self, data: ArrayView2<f64>) -> Result<Array1<usize>, ModelError> {
        check_weight_rows(data.ncols(), self.weights.nrows(), self.weights.ncols())?;
        predict_softmax(self.weights.view(), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::numerical_gradient;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn one_hot_marks_each_label() {
        let targets = one_hot(array![2, 0, 1].view(), 3).unwrap();

        assert_eq!(
            targets,
            array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        );
    }

    #[test]
    fn one_hot_rejects_label_past_class_count() {
        assert!(matches!(
            one_hot(array![0, 3].view(), 3),
            Err(ModelError::LabelOutOfRange { label: 3, n_classes: 3 })
        ));
    }

    #[test]
    fn zero_weights_give_log_k_loss() {
        let data = array![[0.5, 0.1], [0.9, 0.3]];
        let objective =
            MultinomialLogisticObjective::from_labels(data.view(), array![0, 3].view(), 4).unwrap();

        let (loss, _) = objective.evaluate(Array1::zeros(12).view()).unwrap();

        assert_abs_diff_eq!(loss, 4f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn huge_logits_keep_loss_finite() {
        let data = array![[1.0], [-1.0]];
        let objective =
            MultinomialLogisticObjective::from_labels(data.view(), array![0, 1].view(), 2).unwrap();

        let (loss, gradient) = objective
            .evaluate(array![0.0, 0.0, -1e4, 1e4].view())
            .unwrap();

        assert!(loss.is_finite());
        assert!(gradient.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn zero_weights_predict_class_zero() {
        let data = array![[0.1, 0.2], [0.9, 0.8], [0.0, 0.0]];

        let predicted = predict_softmax(Array2::zeros((3, 10)).view(), data.view()).unwrap();

        assert_eq!(predicted, array![0, 0, 0]);
    }

    #[test]
    fn from_flat_is_row_major() {
        let model = SoftmaxRegression::from_flat(array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 2).unwrap();

        assert_eq!(model.weights(), array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
    }

    #[test]
    fn training_separates_toy_data() {
        let data = array![[0.0, 0.1], [0.1, 0.0], [0.9, 1.0], [1.0, 0.9]];
        let labels = array![0, 0, 1, 1];

        let (model, losses) =
            SoftmaxRegression::train(data.view(), labels.view(), 2, &GradientDescent::new(1.0, 50, 0.0))
                .unwrap();

        assert_eq!(model.predict(data.view()).unwrap(), labels);
        assert!(losses.last().unwrap() < &losses[0]);
        for row in model.probabilities(data.view()).unwrap().rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
    }

    fn objective_case() -> impl Strategy<Value = (Array2<f64>, Vec<usize>, usize, Array1<f64>)> {
        (1usize..8, 1usize..4, 2usize..5).prop_flat_map(|(rows, cols, n_classes)| {
            (
                prop::collection::vec(-1.0f64..1.0, rows * cols)
                    .prop_map(move |values| Array2::from_shape_vec((rows, cols), values).unwrap()),
                prop::collection::vec(0..n_classes, rows),
                Just(n_classes),
                prop::collection::vec(-2.0f64..2.0, (cols + 1) * n_classes).prop_map(Array1::from_vec),
            )
        })
    }

    proptest! {
        #[test]
        fn prop_gradient_matches_finite_differences(
            (data, labels, n_classes, params) in objective_case()
        ) {
            let labels = Array1::from_vec(labels);
            let objective =
                MultinomialLogisticObjective::from_labels(data.view(), labels.view(), n_classes).unwrap();

            let (_, analytic) = objective.evaluate(params.view()).unwrap();
            let numeric = numerical_gradient(&objective, params.view(), 1e-6).unwrap();

            for (a, n) in analytic.iter().zip(numeric.iter()) {
                prop_assert!((a - n).abs() < 1e-5, "analytic {} vs numeric {}", a, n);
            }
        }
    }
}

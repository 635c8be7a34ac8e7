//! Two-class logistic regression, used one-vs-rest for digit labels.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

use crate::activation::{argmax_rows, sigmoid, PROBABILITY_FLOOR};
use crate::classifier::Classifier;
use crate::error::ModelError;
use crate::gradient_descent::{GradientDescent, Minimum};
use crate::objective::{affine_scores, check_weight_rows, Objective};

/// Mean binary cross-entropy of one class against the rest.
///
/// Parameters are a `D + 1` vector whose first entry is the bias.
pub struct BinaryLogisticObjective<'a> {
    data: ArrayView2<'a, f64>,
    targets: Array1<f64>,
}

impl<'a> BinaryLogisticObjective<'a> {
    /// `targets` must hold 0.0 or 1.0 per data row.
    pub fn new(data: ArrayView2<'a, f64>, targets: Array1<f64>) -> Result<Self, ModelError> {
        if data.nrows() == 0 {
            return Err(ModelError::Empty);
        }
        if data.nrows() != targets.len() {
            return Err(ModelError::LabelCountMismatch {
                rows: data.nrows(),
                labels: targets.len(),
            });
        }

        Ok(Self { data, targets })
    }

    /// Targets are 1.0 where `labels == class` and 0.0 elsewhere.
    pub fn one_vs_rest(
        data: ArrayView2<'a, f64>,
        labels: ArrayView1<usize>,
        class: usize,
    ) -> Result<Self, ModelError> {
        let targets = labels.mapv(|label| if label == class { 1.0 } else { 0.0 });
        Self::new(data, targets)
    }
}

impl Objective for BinaryLogisticObjective<'_> {
    fn dimension(&self) -> usize {
        self.data.ncols() + 1
    }

    fn evaluate(&self, weights: ArrayView1<f64>) -> Result<(f64, Array1<f64>), ModelError> {
        if weights.len() != self.dimension() {
            return Err(ModelError::ShapeMismatch {
                expected: vec![self.dimension()],
                found: vec![weights.len()],
            });
        }
        let n_rows = self.data.nrows() as f64;

        let theta = (self.data.dot(&weights.slice(s![1..])) + weights[0]).mapv(sigmoid);

        let log_likelihood: f64 = theta
            .iter()
            .zip(self.targets.iter())
            .map(|(&t, &y)| {
                let t = t.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR);
                y * t.ln() + (1.0 - y) * (1.0 - t).ln()
            })
            .sum();
        let loss = -log_likelihood / n_rows;

        let residuals = theta - &self.targets;
        let mut gradient = Array1::zeros(self.dimension());
        gradient[0] = residuals.sum();
        gradient
            .slice_mut(s![1..])
            .assign(&self.data.t().dot(&residuals));
        gradient /= n_rows;

        Ok((loss, gradient))
    }
}

/// Label of the one-vs-rest column with the highest sigmoid score.
///
/// Sigmoid is monotone, so the arg-max is taken over the raw scores; the
/// clamped probabilities would tie once two columns saturate.
pub fn predict_one_vs_rest(
    weights: ArrayView2<f64>,
    data: ArrayView2<f64>,
) -> Result<Array1<usize>, ModelError> {
    Ok(argmax_rows(affine_scores(data, weights)?.view()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct OneVsRestLogistic {
    weights: Array2<f64>,
}

impl OneVsRestLogistic {
    /// `weights` has shape `(D + 1) x K`.
    pub fn new(weights: Array2<f64>) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ArrayView2<f64> {
        self.weights.view()
    }

    /// Trains every class column independently from zero weights and
    /// returns the model with each column's loss history.
    pub fn train(
        data: ArrayView2<f64>,
        labels: ArrayView1<usize>,
        n_classes: usize,
        optimizer: &GradientDescent,
    ) -> Result<(Self, Vec<Vec<f64>>), ModelError> {
        check_labels(labels, n_classes)?;

        let mut weights = Array2::zeros((data.ncols() + 1, n_classes));
        let mut histories = Vec::with_capacity(n_classes);

        for class in 0..n_classes {
            let objective = BinaryLogisticObjective::one_vs_rest(data, labels, class)?;
            let Minimum { params, losses, .. } =
                optimizer.minimize(&objective, Array1::zeros(objective.dimension()))?;

            log::info!(
                "one-vs-rest class {class}: loss {:.6}",
                losses.last().copied().unwrap_or(f64::NAN)
            );
            weights.column_mut(class).assign(&params);
            histories.push(losses);
        }

        Ok((Self { weights }, histories))
    }
}

impl Classifier for OneVsRestLogistic {
    fn name(&self) -> &str {
        "one-vs-rest logistic regression"
    }

    fn predict(&self, data: ArrayView2<f64>) -> Result<Array1<usize>, ModelError> {
        check_weight_rows(data.ncols(), self.weights.nrows(), self.weights.ncols())?;
        predict_one_vs_rest(self.weights.view(), data)
    }
}

pub(crate) fn check_labels(labels: ArrayView1<usize>, n_classes: usize) -> Result<(), ModelError> {
    match labels.iter().find(|&&label| label >= n_classes) {
        Some(&label) => Err(ModelError::LabelOutOfRange { label, n_classes }),
        None => Ok(()),
    }
}

/// Mean of the per-column losses, for logging a whole one-vs-rest model.
pub fn mean_final_loss(histories: &[Vec<f64>]) -> f64 {
    let finals = Array1::from_iter(histories.iter().filter_map(|h| h.last().copied()));
    finals.mean().unwrap_or(f64::NAN)
}

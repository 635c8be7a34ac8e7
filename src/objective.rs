//! The contract between a model's loss and whatever minimizes it.
//!
//! An objective owns (or borrows) its training data and maps a flat parameter
//! vector to a scalar loss plus a gradient of the same length. It does not
//! run any optimization itself; see [`crate::gradient_descent`].

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

use crate::error::ModelError;

pub trait Objective {
    fn dimension(&self) -> usize;

    /// Loss and gradient at `params`. Must accept any finite parameter values.
    fn evaluate(&self, params: ArrayView1<f64>) -> Result<(f64, Array1<f64>), ModelError>;

    fn loss(&self, params: ArrayView1<f64>) -> Result<f64, ModelError> {
        self.evaluate(params).map(|(loss, _)| loss)
    }
}

/// `[1 | data] · weights` without materializing the bias column.
///
/// `weights` has shape `(D + 1) x K`; row 0 holds the bias terms.
pub fn affine_scores(
    data: ArrayView2<f64>,
    weights: ArrayView2<f64>,
) -> Result<Array2<f64>, ModelError> {
    check_weight_rows(data.ncols(), weights.nrows(), weights.ncols())?;

    let mut scores = data.dot(&weights.slice(s![1.., ..]));
    scores += &weights.row(0);
    Ok(scores)
}

/// `(D + 1) x K` gradient of a mean loss whose per-row residuals
/// (prediction minus target) are `residuals`.
pub(crate) fn affine_gradient(data: ArrayView2<f64>, residuals: ArrayView2<f64>) -> Array2<f64> {
    let n_rows = data.nrows() as f64;
    let mut gradient = Array2::zeros((data.ncols() + 1, residuals.ncols()));

    gradient
        .row_mut(0)
        .assign(&residuals.sum_axis(ndarray::Axis(0)));
    gradient
        .slice_mut(s![1.., ..])
        .assign(&data.t().dot(&residuals));
    gradient /= n_rows;

    gradient
}

pub(crate) fn check_weight_rows(
    n_features: usize,
    rows: usize,
    cols: usize,
) -> Result<(), ModelError> {
    if rows == n_features + 1 {
        Ok(())
    } else {
        Err(ModelError::ShapeMismatch {
            expected: vec![n_features + 1, cols],
            found: vec![rows, cols],
        })
    }
}

/// Central finite-difference approximation of the gradient.
pub fn numerical_gradient<O: Objective + ?Sized>(
    objective: &O,
    params: ArrayView1<f64>,
    step: f64,
) -> Result<Array1<f64>, ModelError> {
    let mut probe = params.to_owned();
    let mut gradient = Array1::zeros(params.len());

    for index in 0..params.len() {
        let original = probe[index];

        probe[index] = original + step;
        let forward = objective.loss(probe.view())?;
        probe[index] = original - step;
        let backward = objective.loss(probe.view())?;
        probe[index] = original;

        gradient[index] = (forward - backward) / (2.0 * step);
    }

    Ok(gradient)
}

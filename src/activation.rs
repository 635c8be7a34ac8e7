use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Smallest probability handed to a logarithm; sigmoid output is clamped to
/// `[PROBABILITY_FLOOR, 1 - PROBABILITY_FLOOR]`.
pub const PROBABILITY_FLOOR: f64 = 1e-15;

/// Logistic function, evaluated without overflowing `exp` on either tail.
///
/// The result always lies strictly inside `(0, 1)`.
#[inline]
pub fn sigmoid(z: f64) -> f64 {
    let value = if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let exp_z = z.exp();
        exp_z / (1.0 + exp_z)
    };

    value.clamp(PROBABILITY_FLOOR, 1.0 - PROBABILITY_FLOOR)
}

/// Row-wise softmax. Each row is shifted by its maximum before
/// exponentiating, so large logits cannot overflow.
pub fn softmax_rows(scores: ArrayView2<f64>) -> Array2<f64> {
    let mut probabilities = scores.to_owned();

    for mut row in probabilities.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            let uniform = 1.0 / row.len() as f64;
            row.fill(uniform);
            continue;
        }

        row.mapv_inplace(|value| (value - max).exp());
        let sum = row.sum();
        row /= sum;
    }

    probabilities
}

/// Column index of the largest score in each row. Ties resolve to the
/// lowest index and NaN scores never win.
pub fn argmax_rows(scores: ArrayView2<f64>) -> Array1<usize> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0;
            let mut best_score = f64::NEG_INFINITY;
            for (index, &score) in row.iter().enumerate() {
                if score > best_score {
                    best = index;
                    best_score = score;
                }
            }
            best
        })
        .collect()
}

use ndarray::Array1;

use crate::error::ModelError;
use crate::objective::Objective;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientDescent {
    pub learning_rate: f64,
    pub max_iterations: usize,
    /// Stop once the gradient's L2 norm drops below this.
    pub tolerance: f64,
}

#[derive(Debug, Clone)]
pub struct Minimum {
    pub params: Array1<f64>,
    /// Loss before every step taken, plus the final evaluation if it converged.
    pub losses: Vec<f64>,
    pub converged: bool,
}

impl GradientDescent {
    pub fn new(learning_rate: f64, max_iterations: usize, tolerance: f64) -> Self {
        Self {
            learning_rate,
            max_iterations,
            tolerance,
        }
    }

    pub fn minimize<O: Objective + ?Sized>(
        &self,
        objective: &O,
        initial: Array1<f64>,
    ) -> Result<Minimum, ModelError> {
        if initial.len() != objective.dimension() {
            return Err(ModelError::ShapeMismatch {
                expected: vec![objective.dimension()],
                found: vec![initial.len()],
            });
        }

        let mut params = initial;
        let mut losses = Vec::with_capacity(self.max_iterations);
        let mut converged = false;

        for iteration in 0..self.max_iterations {
            let (loss, gradient) = objective.evaluate(params.view())?;
            losses.push(loss);

            let gradient_norm = gradient.dot(&gradient).sqrt();
            log::debug!("iteration {iteration}: loss {loss:.6}, |grad| {gradient_norm:.3e}");

            if gradient_norm < self.tolerance {
                converged = true;
                break;
            }

            self.step(&mut params, &gradient);
        }

        if !converged && self.tolerance > 0.0 {
            log::warn!(
                "gradient descent stopped after {} iterations without reaching tolerance {}",
                self.max_iterations,
                self.tolerance
            );
        }

        Ok(Minimum {
            params,
            losses,
            converged,
        })
    }

    fn step(&self, params: &mut Array1<f64>, gradient: &Array1<f64>) {
        params.scaled_add(-self.learning_rate, gradient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, ArrayView1};

    /// `(x - 3)^2 + 2 (y + 1)^2`
    struct Bowl;

    impl Objective for Bowl {
        fn dimension(&self) -> usize {
            2
        }

        fn evaluate(&self, p: ArrayView1<f64>) -> Result<(f64, Array1<f64>), ModelError> {
            let loss = (p[0] - 3.0).powi(2) + 2.0 * (p[1] + 1.0).powi(2);
            Ok((loss, array![2.0 * (p[0] - 3.0), 4.0 * (p[1] + 1.0)]))
        }
    }

    #[test]
    fn converges_to_bowl_minimum() {
        let minimum = GradientDescent::new(0.1, 1000, 1e-8)
            .minimize(&Bowl, Array1::zeros(2))
            .unwrap();

        assert!(minimum.converged);
        assert_abs_diff_eq!(minimum.params[0], 3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(minimum.params[1], -1.0, epsilon = 1e-6);
    }

    #[test]
    fn loss_never_increases_with_small_step() {
        let minimum = GradientDescent::new(0.05, 50, 0.0)
            .minimize(&Bowl, array![10.0, 10.0])
            .unwrap();

        assert_eq!(minimum.losses.len(), 50);
        assert!(minimum.losses.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn rejects_wrong_initial_length() {
        let error = GradientDescent::new(0.1, 10, 0.0)
            .minimize(&Bowl, Array1::zeros(3))
            .unwrap_err();

        assert!(matches!(error, ModelError::ShapeMismatch { .. }));
    }
}

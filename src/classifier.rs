use std::fmt;

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::dataset::{Partition, Partitions};
use crate::error::ModelError;

pub trait Classifier {
    fn name(&self) -> &str;

    fn predict(&self, data: ArrayView2<f64>) -> Result<Array1<usize>, ModelError>;
}

/// Percentage of `predicted` labels equal to `truth`. Empty input scores 0.
pub fn accuracy(predicted: ArrayView1<usize>, truth: ArrayView1<usize>) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }

    let correct = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p == t)
        .count();

    correct as f64 / truth.len() as f64 * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub training: f64,
    pub validation: f64,
    pub testing: f64,
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Training set Accuracy:{:.3}%", self.training)?;
        writeln!(f, "Validation set Accuracy:{:.3}%", self.validation)?;
        write!(f, "Testing set Accuracy:{:.3}%", self.testing)
    }
}

pub fn evaluate<C: Classifier + ?Sized>(
    classifier: &C,
    partitions: &Partitions,
) -> Result<Evaluation, ModelError> {
    let score = |partition: &Partition| -> Result<f64, ModelError> {
        let predicted = classifier.predict(partition.data.view())?;
        Ok(accuracy(predicted.view(), partition.labels.view()))
    };

    let evaluation = Evaluation {
        training: score(&partitions.train)?,
        validation: score(&partitions.validation)?,
        testing: score(&partitions.test)?,
    };
    log::info!(
        "{}: train {:.3}%, validation {:.3}%, test {:.3}%",
        classifier.name(),
        evaluation.training,
        evaluation.validation,
        evaluation.testing
    );

    Ok(evaluation)
}

//! Handwritten digit classification with one-vs-rest and softmax logistic
//! regression, plus an optional kernel SVM, over a pruned and scaled MNIST-style
//! pixel dataset.

pub mod activation;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod gradient_descent;
pub mod logistic_regression;
pub mod objective;
pub mod parse;
pub mod plot;
pub mod softmax_regression;
pub mod support_vector_machine;
pub mod weights;

pub use error::{Error, Result};

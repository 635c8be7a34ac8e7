//! Pretrained weight artifacts.
//!
//! Files ending in `.npy` are numpy arrays; anything else is a JSON-serialized
//! ndarray. A `(D + 1) x K` matrix is stored as-is. The multi-class model may
//! also be stored as its flat `(D + 1) * K` row-major parameter vector.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, ArrayView2, Ix1, Ix2};
use ndarray_npy::{read_npy, write_npy};
use serde::Deserialize;

use crate::error::WeightsError;

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredWeights {
    Matrix(Array2<f64>),
    Flat(Array1<f64>),
}

fn is_npy(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "npy")
}

fn read_json(path: &Path) -> Result<StoredWeights, WeightsError> {
    let file = File::open(path).map_err(|source| WeightsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| WeightsError::Format {
        path: path.to_path_buf(),
        source,
    })
}

fn read_numpy(path: &Path) -> Result<StoredWeights, WeightsError> {
    let array: ArrayD<f64> = read_npy(path).map_err(|source| WeightsError::NpyRead {
        path: path.to_path_buf(),
        source,
    })?;
    let found = array.shape().to_vec();
    let wrong_rank = || WeightsError::Shape {
        path: path.to_path_buf(),
        expected: vec![2],
        found: found.clone(),
    };

    match array.ndim() {
        2 => Ok(StoredWeights::Matrix(
            array.into_dimensionality::<Ix2>().map_err(|_| wrong_rank())?,
        )),
        1 => Ok(StoredWeights::Flat(
            array.into_dimensionality::<Ix1>().map_err(|_| wrong_rank())?,
        )),
        _ => Err(wrong_rank()),
    }
}

/// Loads a weight matrix and checks it is exactly `rows x cols` before it
/// reaches any matrix product.
pub fn load(path: impl AsRef<Path>, rows: usize, cols: usize) -> Result<Array2<f64>, WeightsError> {
    let path = path.as_ref();
    let stored = if is_npy(path) {
        read_numpy(path)?
    } else {
        read_json(path)?
    };

    let shape_error = |found: Vec<usize>| WeightsError::Shape {
        path: path.to_path_buf(),
        expected: vec![rows, cols],
        found,
    };

    let weights = match stored {
        StoredWeights::Matrix(matrix) => {
            if matrix.dim() != (rows, cols) {
                return Err(shape_error(matrix.shape().to_vec()));
            }
            matrix
        }
        StoredWeights::Flat(flat) => {
            if flat.len() != rows * cols {
                return Err(shape_error(vec![flat.len()]));
            }
            flat.into_shape_with_order((rows, cols))
                .map_err(|_| shape_error(vec![rows * cols]))?
        }
    };

    log::info!("loaded {rows}x{cols} weights from {}", path.display());
    Ok(weights)
}

pub fn save(path: impl AsRef<Path>, weights: ArrayView2<f64>) -> Result<(), WeightsError> {
    let path = path.as_ref();
    if is_npy(path) {
        write_npy(path, &weights).map_err(|source| WeightsError::NpyWrite {
            path: path.to_path_buf(),
            source,
        })?;
    } else {
        let file = File::create(path).map_err(|source| WeightsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::to_writer(BufWriter::new(file), &weights).map_err(|source| {
            WeightsError::Format {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }

    log::info!(
        "saved {}x{} weights to {}",
        weights.nrows(),
        weights.ncols(),
        path.display()
    );
    Ok(())
}

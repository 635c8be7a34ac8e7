use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse MAT archive {path}: {message}")]
    Mat { path: PathBuf, message: String },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("missing sample pool `{0}`")]
    MissingPool(String),

    #[error("pool `{key}` is not a 2-D matrix (dimensions {dims:?})")]
    NotMatrix { key: String, dims: Vec<usize> },

    #[error("pool `{0}` has an unsupported element type")]
    UnsupportedType(String),

    #[error("pool `{key}` has {found} features, expected {expected}")]
    FeatureMismatch {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("pool `{key}` has {found} rows, fewer than the {required} reserved for validation")]
    TooFewRows {
        key: String,
        required: usize,
        found: usize,
    },

    #[error("invalid value `{value}` at row {row} of pool `{key}`")]
    InvalidValue {
        key: String,
        row: usize,
        value: String,
    },

    #[error("failed to assemble partition: {0}")]
    Assemble(#[from] ndarray::ShapeError),

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("no feature has a training deviation above {threshold}")]
    NoInformativeFeatures { threshold: f64 },
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("{rows} data rows but {labels} labels")]
    LabelCountMismatch { rows: usize, labels: usize },

    #[error("label {label} is out of range for {n_classes} classes")]
    LabelOutOfRange { label: usize, n_classes: usize },

    #[error("empty input")]
    Empty,

    #[error(transparent)]
    Layout(#[from] ndarray::ShapeError),
}

#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("failed to access weight artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed weight artifact {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed npy weight artifact {path}: {source}")]
    NpyRead {
        path: PathBuf,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("failed to write npy weight artifact {path}: {source}")]
    NpyWrite {
        path: PathBuf,
        #[source]
        source: ndarray_npy::WriteNpyError,
    },

    #[error("weight artifact {path} has shape {found:?}, expected {expected:?}")]
    Shape {
        path: PathBuf,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Weights(#[from] WeightsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to draw plot: {0}")]
    Plot(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use matfile::{MatFile, NumericData};
use ndarray::{Array2, ShapeBuilder};

use crate::error::DatasetError;

pub fn train_key(class: usize) -> String {
    format!("train{class}")
}

pub fn test_key(class: usize) -> String {
    format!("test{class}")
}

pub trait PoolSource {
    fn pool(&self, key: &str) -> Result<Array2<f64>, DatasetError>;
}

impl PoolSource for HashMap<String, Array2<f64>> {
    fn pool(&self, key: &str) -> Result<Array2<f64>, DatasetError> {
        self.get(key)
            .cloned()
            .ok_or_else(|| DatasetError::MissingPool(key.to_owned()))
    }
}

pub struct MatArchive {
    file: MatFile,
}

impl MatArchive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = MatFile::parse(BufReader::new(file)).map_err(|error| DatasetError::Mat {
            path: path.to_path_buf(),
            message: format!("{error:?}"),
        })?;

        log::debug!(
            "opened MAT archive {} with {} arrays",
            path.display(),
            file.arrays().len()
        );
        Ok(Self { file })
    }
}

impl PoolSource for MatArchive {
    fn pool(&self, key: &str) -> Result<Array2<f64>, DatasetError> {
        let array = self
            .file
            .find_by_name(key)
            .ok_or_else(|| DatasetError::MissingPool(key.to_owned()))?;

        let dims: &[usize] = array.size();
        let (rows, cols) = match *dims {
            [rows, cols] => (rows, cols),
            _ => {
                return Err(DatasetError::NotMatrix {
                    key: key.to_owned(),
                    dims: dims.to_vec(),
                })
            }
        };

        let values: Vec<f64> = match array.data() {
            NumericData::UInt8 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
            NumericData::Int8 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
            NumericData::UInt16 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
            NumericData::Int16 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
            NumericData::UInt32 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
            NumericData::Int32 { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
            NumericData::Single { real, .. } => real.iter().map(|&v| f64::from(v)).collect(),
            NumericData::Double { real, .. } => real.clone(),
            _ => return Err(DatasetError::UnsupportedType(key.to_owned())),
        };

        // MAT files store matrices column-major
        Array2::from_shape_vec((rows, cols).f(), values).map_err(|_| DatasetError::NotMatrix {
            key: key.to_owned(),
            dims: vec![rows, cols],
        })
    }
}

/// Directory of headerless CSV files named `<key>.csv`.
pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PoolSource for CsvDirectory {
    fn pool(&self, key: &str) -> Result<Array2<f64>, DatasetError> {
        let path = self.root.join(format!("{key}.csv"));
        if !path.is_file() {
            return Err(DatasetError::MissingPool(key.to_owned()));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(|source| DatasetError::Csv {
                path: path.clone(),
                source,
            })?;

        let mut values = Vec::new();
        let mut rows = 0;
        let mut cols = 0;

        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(|source| DatasetError::Csv {
                path: path.clone(),
                source,
            })?;
            cols = record.len();

            for field in &record {
                let value = field
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| DatasetError::InvalidValue {
                        key: key.to_owned(),
                        row,
                        value: field.to_owned(),
                    })?;
                values.push(value);
            }
            rows += 1;
        }

        Array2::from_shape_vec((rows, cols), values).map_err(|_| DatasetError::NotMatrix {
            key: key.to_owned(),
            dims: vec![rows, cols],
        })
    }
}

//! Assembling the train/validation/test partitions from per-class pools.

use ndarray::{concatenate, s, Array1, Array2, ArrayView2, Axis};

use crate::config::DataConfig;
use crate::error::DatasetError;
use crate::parse::{test_key, train_key, PoolSource};

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub data: Array2<f64>,
    pub labels: Array1<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    /// At most `max_rows` rows picked at an even stride, so every class of a
    /// class-ordered partition stays represented.
    pub fn subsample(&self, max_rows: usize) -> Partition {
        if max_rows == 0 || self.len() <= max_rows {
            return self.clone();
        }

        let stride = self.len().div_ceil(max_rows);
        let indices: Vec<usize> = (0..self.len()).step_by(stride).collect();

        Partition {
            data: self.data.select(Axis(0), &indices),
            labels: self.labels.select(Axis(0), &indices),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partitions {
    pub train: Partition,
    pub validation: Partition,
    pub test: Partition,
}

impl Partitions {
    pub fn n_features(&self) -> usize {
        self.train.n_features()
    }

    fn map_data(self, f: impl Fn(Array2<f64>) -> Array2<f64>) -> Self {
        let map = |partition: Partition| Partition {
            data: f(partition.data),
            labels: partition.labels,
        };

        Partitions {
            train: map(self.train),
            validation: map(self.validation),
            test: map(self.test),
        }
    }
}

/// Columns whose training-set standard deviation exceeds a threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMask {
    retained: Vec<usize>,
    n_features: usize,
}

impl FeatureMask {
    /// Population (ddof = 0) deviation per column of `train`.
    pub fn fit(train: ArrayView2<f64>, threshold: f64) -> Result<Self, DatasetError> {
        if train.nrows() == 0 {
            return Err(DatasetError::EmptyTrainingSet);
        }

        let deviation = train.std_axis(Axis(0), 0.0);
        let retained: Vec<usize> = deviation
            .iter()
            .enumerate()
            .filter(|(_, &sigma)| sigma > threshold)
            .map(|(index, _)| index)
            .collect();

        if retained.is_empty() {
            return Err(DatasetError::NoInformativeFeatures { threshold });
        }

        Ok(Self {
            retained,
            n_features: train.ncols(),
        })
    }

    pub fn retained(&self) -> &[usize] {
        &self.retained
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn apply(&self, data: ArrayView2<f64>) -> Array2<f64> {
        data.select(Axis(1), &self.retained)
    }
}

/// Reserves the first `validation_per_class` rows of every training pool
/// for validation and concatenates the test pools unchanged.
pub fn split_pools<S: PoolSource + ?Sized>(
    source: &S,
    n_classes: usize,
    validation_per_class: usize,
) -> Result<Partitions, DatasetError> {
    let mut n_features = None;
    let mut check_features = |key: &str, pool: &Array2<f64>| -> Result<(), DatasetError> {
        let expected = *n_features.get_or_insert(pool.ncols());
        if pool.ncols() == expected {
            Ok(())
        } else {
            Err(DatasetError::FeatureMismatch {
                key: key.to_owned(),
                expected,
                found: pool.ncols(),
            })
        }
    };

    let mut train_pools = Vec::with_capacity(n_classes);
    let mut test_pools = Vec::with_capacity(n_classes);

    for class in 0..n_classes {
        let key = train_key(class);
        let pool = source.pool(&key)?;
        check_features(&key, &pool)?;
        if pool.nrows() < validation_per_class {
            return Err(DatasetError::TooFewRows {
                key,
                required: validation_per_class,
                found: pool.nrows(),
            });
        }
        train_pools.push(pool);
    }

    for class in 0..n_classes {
        let key = test_key(class);
        let pool = source.pool(&key)?;
        check_features(&key, &pool)?;
        test_pools.push(pool);
    }

    let n_features = n_features.unwrap_or(0);
    let validation = stack(
        n_features,
        train_pools
            .iter()
            .map(|pool| pool.slice(s![..validation_per_class, ..])),
    )?;
    let train = stack(
        n_features,
        train_pools
            .iter()
            .map(|pool| pool.slice(s![validation_per_class.., ..])),
    )?;
    let test = stack(n_features, test_pools.iter().map(Array2::view))?;

    Ok(Partitions {
        train,
        validation,
        test,
    })
}

/// Concatenates class blocks in order, labelling block `i` with class `i`.
fn stack<'a>(
    n_features: usize,
    blocks: impl Iterator<Item = ArrayView2<'a, f64>>,
) -> Result<Partition, DatasetError> {
    let blocks: Vec<ArrayView2<f64>> = blocks.collect();

    let data = if blocks.is_empty() {
        Array2::zeros((0, n_features))
    } else {
        concatenate(Axis(0), &blocks)?
    };
    let labels = blocks
        .iter()
        .enumerate()
        .flat_map(|(class, block)| std::iter::repeat(class).take(block.nrows()))
        .collect();

    Ok(Partition { data, labels })
}

/// Divides every value by `scale`, mapping raw `[0, scale]` pixels into `[0, 1]`.
pub fn scale_pixels(mut data: Array2<f64>, scale: f64) -> Array2<f64> {
    data /= scale;
    data
}

/// Full preprocessing: split, prune uninformative columns using the
/// training set only, then scale pixel intensities.
pub fn preprocess<S: PoolSource + ?Sized>(
    source: &S,
    config: &DataConfig,
) -> Result<Partitions, DatasetError> {
    let partitions = split_pools(source, config.n_classes, config.validation_per_class)?;
    log::info!(
        "split pools: {} train, {} validation, {} test rows with {} features",
        partitions.train.len(),
        partitions.validation.len(),
        partitions.test.len(),
        partitions.n_features()
    );

    let mask = FeatureMask::fit(partitions.train.data.view(), config.std_threshold)?;
    log::info!(
        "retained {} of {} features (std > {})",
        mask.retained().len(),
        mask.n_features(),
        config.std_threshold
    );

    let scale = config.pixel_scale;
    Ok(partitions.map_data(|data| scale_pixels(mask.apply(data.view()), scale)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn pools(n_classes: usize, train_rows: usize, test_rows: usize) -> HashMap<String, Array2<f64>> {
        let mut pools = HashMap::new();
        for class in 0..n_classes {
            let train = Array2::from_shape_fn((train_rows, 3), |(r, c)| {
                if c == 0 {
                    7.0
                } else {
                    (class * 10 + r + c) as f64
                }
            });
            let test = Array2::from_shape_fn((test_rows, 3), |(r, c)| (class + r * c) as f64);
            pools.insert(train_key(class), train);
            pools.insert(test_key(class), test);
        }
        pools
    }

    fn data_config(validation_per_class: usize) -> DataConfig {
        DataConfig {
            n_classes: 3,
            validation_per_class,
            ..DataConfig::default()
        }
    }

    #[test]
    fn split_reserves_validation_rows_per_class() {
        let partitions = split_pools(&pools(3, 5, 2), 3, 2).unwrap();

        assert_eq!(partitions.validation.len(), 6);
        assert_eq!(partitions.train.len(), 9);
        assert_eq!(partitions.test.len(), 6);
        assert_eq!(partitions.validation.labels, array![0, 0, 1, 1, 2, 2]);
        assert_eq!(partitions.train.labels, array![0, 0, 0, 1, 1, 1, 2, 2, 2]);
        assert_eq!(partitions.test.labels, array![0, 0, 1, 1, 2, 2]);
        // validation takes the head of each pool, training the tail
        assert_eq!(partitions.validation.data.row(2), array![7.0, 11.0, 12.0]);
        assert_eq!(partitions.train.data.row(3), array![7.0, 13.0, 14.0]);
    }

    #[test]
    fn split_fails_on_missing_pool() {
        let mut source = pools(3, 5, 2);
        source.remove("test1");

        let error = split_pools(&source, 3, 2).unwrap_err();

        assert!(matches!(error, DatasetError::MissingPool(key) if key == "test1"));
    }

    #[test]
    fn split_fails_when_pool_is_too_small() {
        let error = split_pools(&pools(3, 1, 2), 3, 2).unwrap_err();

        assert!(matches!(
            error,
            DatasetError::TooFewRows { required: 2, found: 1, .. }
        ));
    }

    #[test]
    fn split_fails_on_feature_mismatch() {
        let mut source = pools(3, 5, 2);
        source.insert(test_key(2), Array2::zeros((2, 4)));

        let error = split_pools(&source, 3, 2).unwrap_err();

        assert!(matches!(
            error,
            DatasetError::FeatureMismatch { expected: 3, found: 4, .. }
        ));
    }

    #[test]
    fn mask_keeps_only_varying_column() {
        let train = array![[5.0, 0.0], [5.0, 128.0], [5.0, 255.0]];
        let validation = array![[1.0, 2.0]];
        let test = array![[9.0, 3.0], [4.0, 4.0]];

        let mask = FeatureMask::fit(train.view(), 0.001).unwrap();

        assert_eq!(mask.retained(), &[1]);
        assert_eq!(mask.apply(train.view()), array![[0.0], [128.0], [255.0]]);
        assert_eq!(mask.apply(validation.view()), array![[2.0]]);
        assert_eq!(mask.apply(test.view()), array![[3.0], [4.0]]);
    }

    #[test]
    fn mask_rejects_all_constant_training_data() {
        let train = array![[1.0, 2.0], [1.0, 2.0]];

        assert!(matches!(
            FeatureMask::fit(train.view(), 0.001),
            Err(DatasetError::NoInformativeFeatures { .. })
        ));
    }

    #[test]
    fn preprocess_prunes_with_training_statistics() {
        let partitions = preprocess(&pools(3, 5, 2), &data_config(2)).unwrap();

        // column 0 is constant in every training pool
        assert_eq!(partitions.train.n_features(), 2);
        assert_eq!(partitions.validation.n_features(), 2);
        assert_eq!(partitions.test.n_features(), 2);
        assert!(partitions.train.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn subsample_spreads_over_classes() {
        let partition = Partition {
            data: Array2::zeros((10, 1)),
            labels: array![0, 0, 0, 0, 0, 1, 1, 1, 1, 1],
        };

        let sample = partition.subsample(4);

        assert!(sample.len() <= 4);
        assert!(sample.labels.iter().any(|&l| l == 0));
        assert!(sample.labels.iter().any(|&l| l == 1));
    }

    proptest! {
        #[test]
        fn prop_scaled_pixels_stay_in_unit_interval(
            pixels in prop::collection::vec(0.0f64..=255.0, 1..64)
        ) {
            let data = Array2::from_shape_vec((1, pixels.len()), pixels).unwrap();
            let scaled = scale_pixels(data, 255.0);

            prop_assert!(scaled.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }
}

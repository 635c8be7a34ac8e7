//! Run configuration, read from YAML. Every field has a default, so an
//! empty or absent file reproduces the stock digit experiment.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gradient_descent::GradientDescent;
use crate::support_vector_machine::{KernelType, SmoSolver};

pub const CONFIG_ENV: &str = "DIGITS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "digits.yaml";

pub const LOGISTIC_WEIGHTS: &str = "params.json";
pub const SOFTMAX_WEIGHTS: &str = "params_bonus.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data: DataConfig,
    pub logistic: ModelConfig,
    pub softmax: ModelConfig,
    pub svm: SvmConfig,
    /// Directory for training curve images; none are drawn when unset.
    pub plot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolFormat {
    /// MATLAB v5 archive with `train0..` / `test0..` variables.
    #[default]
    Mat,
    /// Directory of `<key>.csv` files.
    Csv,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub path: PathBuf,
    pub format: PoolFormat,
    pub n_classes: usize,
    pub validation_per_class: usize,
    pub std_threshold: f64,
    pub pixel_scale: f64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("mnist_all.mat"),
            format: PoolFormat::Mat,
            n_classes: 10,
            validation_per_class: 1000,
            std_threshold: 0.001,
            pixel_scale: 255.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Weight artifact, `.npy` or JSON; each model has its own default file name.
    pub weights: Option<PathBuf>,
    /// Train and save the weights when the artifact does not exist yet.
    pub train_if_missing: bool,
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    pub learning_rate: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            max_iterations: 100,
            tolerance: 1e-5,
        }
    }
}

impl From<OptimizerConfig> for GradientDescent {
    fn from(config: OptimizerConfig) -> Self {
        GradientDescent::new(config.learning_rate, config.max_iterations, config.tolerance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SvmConfig {
    pub enabled: bool,
    /// Training rows used to fit each machine; 0 means all of them.
    pub max_samples: usize,
    pub tolerance: f64,
    pub max_passes: usize,
    pub max_sweeps: usize,
    pub runs: Vec<SvmRun>,
}

impl Default for SvmConfig {
    fn default() -> Self {
        let mut runs = vec![
            SvmRun {
                kernel: KernelType::Linear,
                regularization: 1.0,
            },
            SvmRun {
                kernel: KernelType::Rbf { gamma: Some(1.0) },
                regularization: 1.0,
            },
        ];
        runs.extend(
            [1.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
                .into_iter()
                .map(|regularization| SvmRun {
                    kernel: KernelType::Rbf { gamma: None },
                    regularization,
                }),
        );

        Self {
            enabled: false,
            max_samples: 2000,
            tolerance: 1e-3,
            max_passes: 5,
            max_sweeps: 50,
            runs,
        }
    }
}

impl SvmConfig {
    pub fn solver(&self, regularization: f64) -> SmoSolver {
        SmoSolver {
            regularization,
            tolerance: self.tolerance,
            max_passes: self.max_passes,
            max_sweeps: self.max_sweeps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SvmRun {
    pub kernel: KernelType,
    pub regularization: f64,
}

impl Config {
    pub fn logistic_weights(&self) -> PathBuf {
        self.logistic
            .weights
            .clone()
            .unwrap_or_else(|| PathBuf::from(LOGISTIC_WEIGHTS))
    }

    pub fn softmax_weights(&self) -> PathBuf {
        self.softmax
            .weights
            .clone()
            .unwrap_or_else(|| PathBuf::from(SOFTMAX_WEIGHTS))
    }

    pub fn from_yaml(yaml: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml, path)
    }

    /// `$DIGITS_CONFIG` if set, else `digits.yaml` if present, else defaults.
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::load(PathBuf::from(path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.is_file() {
            Self::load(fallback)
        } else {
            log::info!("no {DEFAULT_CONFIG_PATH} found, using default configuration");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| Err(ConfigError::Invalid(message));

        if self.data.n_classes < 2 {
            return invalid(format!(
                "data.n_classes must be at least 2, got {}",
                self.data.n_classes
            ));
        }
        if self.data.pixel_scale <= 0.0 {
            return invalid(format!(
                "data.pixel_scale must be positive, got {}",
                self.data.pixel_scale
            ));
        }
        if self.data.std_threshold < 0.0 {
            return invalid(format!(
                "data.std_threshold must not be negative, got {}",
                self.data.std_threshold
            ));
        }
        for (name, model) in [("logistic", &self.logistic), ("softmax", &self.softmax)] {
            if model.optimizer.learning_rate <= 0.0 {
                return invalid(format!(
                    "{name}.optimizer.learning_rate must be positive, got {}",
                    model.optimizer.learning_rate
                ));
            }
        }
        for run in &self.svm.runs {
            if run.regularization <= 0.0 {
                return invalid(format!(
                    "svm regularization must be positive, got {}",
                    run.regularization
                ));
            }
            if let KernelType::Rbf { gamma: Some(gamma) } = run.kernel {
                if gamma <= 0.0 {
                    return invalid(format!("svm rbf gamma must be positive, got {gamma}"));
                }
            }
        }

        Ok(())
    }
}

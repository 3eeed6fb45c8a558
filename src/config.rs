//! Pipeline configuration
//!
//! The whole YAML document is parsed once into an immutable [`PipelineConfig`]
//! and handed to each stage by reference. Sections other than `base` are
//! optional at parse time; a stage asks for the section it needs and fails
//! with [`PipelineError::Config`] when it is absent. Keys inside a present
//! section are validated eagerly, so a malformed document aborts before any
//! stage touches the filesystem.

use crate::error::{PipelineError, Result};
use crate::preprocessing::ImputeMethod;
use crate::training::{EstimatorKind, ParamGrid, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Columns the raw air-quality export is expected to provide, after name
/// normalization.
pub const DEFAULT_EXPECTED_COLUMNS: &[&str] = &[
    "Date", "Time", "CO_GT_", "PT08_S1_CO_", "NMHC_GT_", "C6H6_GT_", "PT08_S2_NMHC_",
    "NOx_GT_", "PT08_S3_NOx_", "NO2_GT_", "PT08_S4_NO2_", "PT08_S5_O3_", "T", "RH", "AH",
];

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    #[serde(default)]
    pub data_load: Option<DataLoadConfig>,
    #[serde(default)]
    pub featurize: Option<FeaturizeConfig>,
    #[serde(default)]
    pub data_split: Option<DataSplitConfig>,
    #[serde(default)]
    pub train: Option<TrainConfig>,
    #[serde(default)]
    pub evaluate: Option<EvaluateConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Log level name (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seed shared by every stochastic component
    pub random_state: u64,
}

/// Raw ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLoadConfig {
    pub dataset_csv: PathBuf,
    pub dataset_csv_cleaned: PathBuf,
    #[serde(default = "default_separator")]
    pub separator: char,
    /// Raw export writes `2,6` for 2.6
    #[serde(default = "default_true")]
    pub decimal_comma: bool,
    #[serde(default)]
    pub expected_columns: Option<Vec<String>>,
}

impl DataLoadConfig {
    pub fn expected_columns(&self) -> Vec<String> {
        match &self.expected_columns {
            Some(cols) => cols.clone(),
            None => DEFAULT_EXPECTED_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Feature engineering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturizeConfig {
    #[serde(alias = "columns_to_drop")]
    pub cols_to_drop: Vec<String>,
    pub target_column: String,
    /// Column name -> imputation method
    #[serde(default)]
    pub imputation: BTreeMap<String, ImputeMethod>,
    #[serde(default = "default_skew_threshold")]
    pub skew_threshold: f64,
    #[serde(default = "default_outlier_sigma")]
    pub outlier_sigma: f64,
    #[serde(rename = "X_scaled_csv_path", alias = "x_path")]
    pub x_path: PathBuf,
    #[serde(rename = "y_csv_path", alias = "y_path")]
    pub y_path: PathBuf,
}

/// Train/test partition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSplitConfig {
    pub test_size: f64,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(rename = "X_train_csv_path")]
    pub x_train_path: PathBuf,
    #[serde(rename = "X_test_csv_path")]
    pub x_test_path: PathBuf,
    #[serde(rename = "X_train_scaled_csv_path")]
    pub x_train_scaled_path: PathBuf,
    #[serde(rename = "X_test_scaled_csv_path")]
    pub x_test_scaled_path: PathBuf,
    #[serde(rename = "y_train_csv_path")]
    pub y_train_path: PathBuf,
    #[serde(rename = "y_test_csv_path")]
    pub y_test_path: PathBuf,
    /// Where to persist the train-fitted scaler, needed by `predict`
    #[serde(default)]
    pub scaler_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatorConfig {
    pub param_grid: BTreeMap<String, Vec<ParamValue>>,
}

/// Model selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub estimator_name: String,
    pub estimators: BTreeMap<String, EstimatorConfig>,
    /// Number of cross-validation folds
    pub cv: usize,
    pub model_path: PathBuf,
    /// Worker threads for the grid search (all cores when unset)
    #[serde(default)]
    pub n_jobs: Option<usize>,
}

impl TrainConfig {
    /// Estimator selected by `estimator_name`
    pub fn estimator(&self) -> Result<EstimatorKind> {
        self.estimator_name.parse()
    }

    /// Parameter grid of the selected estimator
    pub fn param_grid(&self) -> Result<ParamGrid> {
        let estimator = self.estimators.get(&self.estimator_name).ok_or_else(|| {
            PipelineError::Config(format!(
                "train.estimators.{} is missing",
                self.estimator_name
            ))
        })?;
        ParamGrid::new(estimator.param_grid.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateConfig {
    pub reports_dir: PathBuf,
    pub metrics_file: String,
}

impl EvaluateConfig {
    pub fn metrics_path(&self) -> PathBuf {
        self.reports_dir.join(&self.metrics_file)
    }
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_separator() -> char {
    ';'
}

fn default_true() -> bool {
    true
}

fn default_skew_threshold() -> f64 {
    1.25
}

fn default_outlier_sigma() -> f64 {
    4.0
}

fn missing_section(name: &str) -> PipelineError {
    PipelineError::Config(format!("missing required section '{}'", name))
}

impl PipelineConfig {
    /// Load and validate a configuration document
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn data_load(&self) -> Result<&DataLoadConfig> {
        self.data_load.as_ref().ok_or_else(|| missing_section("data_load"))
    }

    pub fn featurize(&self) -> Result<&FeaturizeConfig> {
        self.featurize.as_ref().ok_or_else(|| missing_section("featurize"))
    }

    pub fn data_split(&self) -> Result<&DataSplitConfig> {
        self.data_split.as_ref().ok_or_else(|| missing_section("data_split"))
    }

    pub fn train(&self) -> Result<&TrainConfig> {
        self.train.as_ref().ok_or_else(|| missing_section("train"))
    }

    pub fn evaluate(&self) -> Result<&EvaluateConfig> {
        self.evaluate.as_ref().ok_or_else(|| missing_section("evaluate"))
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if let Some(f) = &self.featurize {
            if !(f.skew_threshold.is_finite() && f.skew_threshold > 0.0) {
                return Err(PipelineError::Config(format!(
                    "featurize.skew_threshold must be positive, got {}",
                    f.skew_threshold
                )));
            }
            if !(f.outlier_sigma.is_finite() && f.outlier_sigma > 0.0) {
                return Err(PipelineError::Config(format!(
                    "featurize.outlier_sigma must be positive, got {}",
                    f.outlier_sigma
                )));
            }
            if f.cols_to_drop.contains(&f.target_column) {
                return Err(PipelineError::Config(format!(
                    "target column '{}' is listed in featurize.cols_to_drop",
                    f.target_column
                )));
            }
        }

        if let Some(s) = &self.data_split {
            if !(s.test_size > 0.0 && s.test_size < 1.0) {
                return Err(PipelineError::Config(format!(
                    "data_split.test_size must be in (0, 1), got {}",
                    s.test_size
                )));
            }
            if s.shuffle {
                return Err(PipelineError::Config(
                    "data_split.shuffle is not supported: row order is temporal".to_string(),
                ));
            }
        }

        if let Some(t) = &self.train {
            if t.cv < 2 {
                return Err(PipelineError::Config(format!(
                    "train.cv must be at least 2, got {}",
                    t.cv
                )));
            }
            if t.n_jobs == Some(0) {
                return Err(PipelineError::Config("train.n_jobs must be at least 1".to_string()));
            }
            t.estimator()?;
            t.param_grid()?.validate()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
base:
  log_level: INFO
  random_state: 42
data_load:
  dataset_csv: data/raw/AirQualityUCI.csv
  dataset_csv_cleaned: data/processed/cleaned.csv
featurize:
  cols_to_drop: [Date, Time, NMHC_GT_]
  target_column: CO_GT_
  imputation:
    CO_GT_: mean
    T: median
    RH: mode
  X_scaled_csv_path: data/processed/X.csv
  y_csv_path: data/processed/y.csv
data_split:
  test_size: 0.2
  X_train_csv_path: data/processed/X_train.csv
  X_test_csv_path: data/processed/X_test.csv
  X_train_scaled_csv_path: data/processed/X_train_scaled.csv
  X_test_scaled_csv_path: data/processed/X_test_scaled.csv
  y_train_csv_path: data/processed/y_train.csv
  y_test_csv_path: data/processed/y_test.csv
train:
  estimator_name: random_forest
  estimators:
    random_forest:
      param_grid:
        n_estimators: [10, 20]
        max_depth: [null, 8]
  cv: 3
  model_path: models/model.bin
evaluate:
  reports_dir: reports
  metrics_file: metrics.json
"#;

    #[test]
    fn test_parse_full_document() {
        let config = PipelineConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.base.random_state, 42);

        let f = config.featurize().unwrap();
        assert_eq!(f.skew_threshold, 1.25);
        assert_eq!(f.outlier_sigma, 4.0);
        assert_eq!(f.imputation.get("T"), Some(&ImputeMethod::Median));
        assert_eq!(f.imputation.get("RH"), Some(&ImputeMethod::Mode));

        let s = config.data_split().unwrap();
        assert!(!s.shuffle);
        assert!(s.scaler_path.is_none());

        let t = config.train().unwrap();
        assert_eq!(t.param_grid().unwrap().len(), 4);
        assert_eq!(config.evaluate().unwrap().metrics_path(), PathBuf::from("reports/metrics.json"));
        assert_eq!(config.data_load().unwrap().separator, ';');
    }

    #[test]
    fn test_unknown_imputation_method_fails_at_parse() {
        let doc = SAMPLE.replace("RH: mode", "RH: interpolate");
        let err = PipelineConfig::from_yaml_str(&doc).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.to_string().contains("interpolate"));
    }

    #[test]
    fn test_missing_required_key() {
        let doc = SAMPLE.replace("  test_size: 0.2\n", "");
        let err = PipelineConfig::from_yaml_str(&doc).unwrap_err();
        assert!(err.to_string().contains("test_size"));
    }

    #[test]
    fn test_missing_section_reported_by_accessor() {
        let doc = "base:\n  random_state: 1\n";
        let config = PipelineConfig::from_yaml_str(doc).unwrap();
        assert_eq!(config.base.log_level, "INFO");
        let err = config.train().unwrap_err();
        assert!(err.to_string().contains("'train'"));
    }

    #[test]
    fn test_shuffle_rejected() {
        let doc = SAMPLE.replace("  test_size: 0.2\n", "  test_size: 0.2\n  shuffle: true\n");
        assert!(matches!(
            PipelineConfig::from_yaml_str(&doc),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_ranges() {
        let doc = SAMPLE.replace("test_size: 0.2", "test_size: 1.5");
        assert!(PipelineConfig::from_yaml_str(&doc).is_err());

        let doc = SAMPLE.replace("cv: 3", "cv: 1");
        assert!(PipelineConfig::from_yaml_str(&doc).is_err());
    }

    #[test]
    fn test_unknown_estimator_and_param() {
        let doc = SAMPLE.replace("estimator_name: random_forest", "estimator_name: svr");
        assert!(matches!(
            PipelineConfig::from_yaml_str(&doc),
            Err(PipelineError::Config(_))
        ));

        let doc = SAMPLE.replace("max_depth: [null, 8]", "learning_rate: [0.1]");
        let err = PipelineConfig::from_yaml_str(&doc).unwrap_err();
        assert!(err.to_string().contains("learning_rate"));
    }
}

//! Data preprocessing
//!
//! Building blocks of the featurize and split stages:
//! - Sentinel normalization and per-column imputation
//! - Sequential sigma-rule outlier rejection
//! - Skewness measurement and Box-Cox correction
//! - Min-max scaling fit on the training partition

pub mod imputer;
pub mod outlier;
pub mod scaler;
pub mod transforms;

pub use imputer::{normalize_missing, ImputeMethod, Imputer, MISSING_SENTINEL};
pub use outlier::{OutlierStep, SigmaFilter};
pub use scaler::{ColumnScale, MinMaxScaler};
pub use transforms::{boxcox_lambda, boxcox_value, skewness, SkewCorrector, SkewEntry, SkewOutcome};

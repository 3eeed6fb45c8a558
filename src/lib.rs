//! aqpipe - Config-driven air-quality regression pipeline
//!
//! Turns a raw sensor export into a trained regression model and a metrics
//! report, one stage at a time:
//! - load: select and normalize the expected columns
//! - featurize: missing-value imputation, outlier filtering, skew correction
//! - split: ordered train/test partition and min-max scaling
//! - train: grid-searched random forest with k-fold cross-validation
//! - evaluate: R², RMSE and MAE on both partitions
//!
//! Every stage is driven by one YAML file (see [`config::PipelineConfig`]).
//!
//! # Modules
//!
//! - [`preprocessing`] - Imputer, sigma outlier filter, Box-Cox, min-max scaler
//! - [`training`] - Decision tree, random forest, cross-validation, grid search
//! - [`stages`] - The five pipeline stages
//! - [`inference`] - Single-row prediction from persisted artifacts
//! - [`cli`] - Command-line interface

pub mod config;
pub mod error;

pub mod inference;
pub mod preprocessing;
pub mod stages;
pub mod training;
pub mod utils;

pub mod cli;

pub use error::{PipelineError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{PipelineError, Result};

    pub use crate::preprocessing::{ImputeMethod, Imputer, MinMaxScaler, SigmaFilter, SkewCorrector};

    pub use crate::training::{
        CrossValidator, EstimatorKind, ForestParams, GridSearch, ParamGrid, RandomForest,
        RegressionMetrics,
    };

    pub use crate::stages::{run_all, MetricsReport, ModelArtifact};

    pub use crate::inference::{Prediction, Predictor};
}

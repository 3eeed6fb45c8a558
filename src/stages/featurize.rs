//! Feature engineering: cleaned table -> (X, y)

use crate::config::{FeaturizeConfig, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{
    normalize_missing, Imputer, OutlierStep, SigmaFilter, SkewCorrector, SkewEntry, SkewOutcome,
};
use crate::utils::{column_names, DataLoader, DataSaver};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// What the feature engineer did to the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturizeReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub fill_values: BTreeMap<String, f64>,
    pub outlier_steps: Vec<OutlierStep>,
    pub skew: Vec<SkewEntry>,
    pub feature_columns: Vec<String>,
    pub target_column: String,
}

impl FeaturizeReport {
    /// Columns that were Box-Cox transformed
    pub fn transformed_columns(&self) -> Vec<&str> {
        self.skew
            .iter()
            .filter(|e| e.outcome == SkewOutcome::Transformed)
            .map(|e| e.column.as_str())
            .collect()
    }
}

/// Engineered features and target, row-aligned
#[derive(Debug, Clone)]
pub struct Features {
    pub x: DataFrame,
    pub y: DataFrame,
    pub report: FeaturizeReport,
}

/// Run the feature engineering steps on an in-memory table
pub fn engineer_features(df: &DataFrame, cfg: &FeaturizeConfig) -> Result<Features> {
    let rows_in = df.height();
    let present = column_names(df);

    for name in cfg.cols_to_drop.iter().chain(std::iter::once(&cfg.target_column)) {
        if !present.contains(name) {
            return Err(PipelineError::DataShape(format!(
                "column '{}' is not in the table",
                name
            )));
        }
    }

    let mut table = df.clone();
    for name in &cfg.cols_to_drop {
        table = table.drop(name)?;
    }

    let table = normalize_missing(&table)?;

    let mut imputer = Imputer::new(cfg.imputation.clone());
    let table = imputer.fit_transform(&table)?;
    info!(columns = imputer.fill_values().len(), "Missing values imputed");

    let (table, outlier_steps) = SigmaFilter::new(cfg.outlier_sigma).apply(&table)?;
    info!(
        rows_before = rows_in,
        rows_after = table.height(),
        sigma = cfg.outlier_sigma,
        "Outliers removed"
    );
    if table.height() == 0 {
        return Err(PipelineError::DataShape(
            "no rows left after outlier removal".to_string(),
        ));
    }

    let y = table.select([cfg.target_column.as_str()])?;
    let x = table.drop(&cfg.target_column)?;
    if x.width() == 0 {
        return Err(PipelineError::DataShape("no feature columns left".to_string()));
    }

    let (x, skew) = SkewCorrector::new(cfg.skew_threshold).apply(&x)?;

    let report = FeaturizeReport {
        rows_in,
        rows_out: x.height(),
        fill_values: imputer.fill_values().clone(),
        outlier_steps,
        skew,
        feature_columns: column_names(&x),
        target_column: cfg.target_column.clone(),
    };

    Ok(Features { x, y, report })
}

/// Read the cleaned table, engineer features and write X and y
pub fn run(config: &PipelineConfig) -> Result<FeaturizeReport> {
    let cleaned_path = &config.data_load()?.dataset_csv_cleaned;
    let cfg = config.featurize()?;

    info!(path = %cleaned_path.display(), "Loading cleaned dataset");
    let df = DataLoader::new().load_csv(cleaned_path)?;

    let Features { mut x, mut y, report } = engineer_features(&df, cfg)?;
    for entry in &report.skew {
        info!(
            column = %entry.column,
            skew_before = entry.skew_before,
            skew_after = entry.skew_after,
            lambda = entry.lambda,
            outcome = ?entry.outcome,
            "Skew check"
        );
    }

    DataSaver::save_csv(&mut x, &cfg.x_path)?;
    DataSaver::save_csv(&mut y, &cfg.y_path)?;
    info!(
        x_path = %cfg.x_path.display(),
        y_path = %cfg.y_path.display(),
        rows = report.rows_out,
        features = report.feature_columns.len(),
        "Features saved"
    );

    Ok(report)
}

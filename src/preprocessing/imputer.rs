//! Missing value handling
//!
//! The raw export marks missing readings with the sentinel `-200`. They are
//! turned into nulls before any statistic is computed, then filled per column
//! with the configured [`ImputeMethod`].

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Sentinel used by the raw export for a missing reading
pub const MISSING_SENTINEL: f64 = -200.0;

/// Per-column fill strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImputeMethod {
    Mean,
    Median,
    /// Most frequent value; ties go to the smallest
    Mode,
}

impl fmt::Display for ImputeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImputeMethod::Mean => write!(f, "mean"),
            ImputeMethod::Median => write!(f, "median"),
            ImputeMethod::Mode => write!(f, "mode"),
        }
    }
}

/// Cast every column to Float64 and replace the sentinel with null.
///
/// Non-numeric columns are a [`PipelineError::DataShape`].
pub fn normalize_missing(df: &DataFrame) -> Result<DataFrame> {
    let mut result = df.clone();
    for column in df.get_columns() {
        let series = column.as_materialized_series();
        if !series.dtype().is_primitive_numeric() {
            return Err(PipelineError::DataShape(format!(
                "column '{}' is not numeric ({})",
                series.name(),
                series.dtype()
            )));
        }
        let cast = series.cast(&DataType::Float64)?;
        let cleaned: Float64Chunked = cast
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| *x != MISSING_SENTINEL))
            .collect();
        result.with_column(cleaned.with_name(series.name().clone()).into_series())?;
    }
    Ok(result)
}

/// Fills nulls column by column with statistics of the observed values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imputer {
    methods: BTreeMap<String, ImputeMethod>,
    fill_values: BTreeMap<String, f64>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new(methods: BTreeMap<String, ImputeMethod>) -> Self {
        Self {
            methods,
            fill_values: BTreeMap::new(),
            is_fitted: false,
        }
    }

    /// Compute one fill value per configured column
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.fill_values.clear();
        for (name, method) in &self.methods {
            let column = df.column(name).map_err(|_| {
                PipelineError::DataShape(format!(
                    "imputation column '{}' is not in the table",
                    name
                ))
            })?;
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            let observed: Vec<f64> = series.f64()?.into_iter().flatten().collect();

            let fill = fill_value(&observed, *method).ok_or_else(|| PipelineError::Imputation {
                column: name.clone(),
                reason: format!("no observed values to compute the {}", method),
            })?;
            debug!(
                column = %name,
                method = %method,
                fill,
                n_missing = series.null_count(),
                "Imputation value computed"
            );
            self.fill_values.insert(name.clone(), fill);
        }
        self.is_fitted = true;
        Ok(self)
    }

    /// Replace nulls in the configured columns with their fill values
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (name, fill) in &self.fill_values {
            let column = df
                .column(name)
                .map_err(|_| PipelineError::ColumnNotFound(name.clone()))?;
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            let filled: Float64Chunked = series
                .f64()?
                .into_iter()
                .map(|v| Some(v.unwrap_or(*fill)))
                .collect();
            result.with_column(filled.with_name(series.name().clone()).into_series())?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Fill value chosen for each configured column
    pub fn fill_values(&self) -> &BTreeMap<String, f64> {
        &self.fill_values
    }
}

fn fill_value(observed: &[f64], method: ImputeMethod) -> Option<f64> {
    if observed.is_empty() {
        return None;
    }
    match method {
        ImputeMethod::Mean => Some(observed.iter().sum::<f64>() / observed.len() as f64),
        ImputeMethod::Median => {
            let mut sorted = observed.to_vec();
            sorted.sort_by(f64::total_cmp);
            let mid = sorted.len() / 2;
            if sorted.len() % 2 == 0 {
                Some((sorted[mid - 1] + sorted[mid]) / 2.0)
            } else {
                Some(sorted[mid])
            }
        }
        ImputeMethod::Mode => {
            let mut sorted = observed.to_vec();
            sorted.sort_by(f64::total_cmp);

            // Runs of equal values in ascending order; strict `>` keeps the
            // smallest value on ties.
            let mut best = (sorted[0], 0usize);
            let mut run = (sorted[0], 0usize);
            for &v in &sorted {
                if v == run.0 {
                    run.1 += 1;
                } else {
                    run = (v, 1);
                }
                if run.1 > best.1 {
                    best = run;
                }
            }
            Some(best.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methods(entries: &[(&str, ImputeMethod)]) -> BTreeMap<String, ImputeMethod> {
        entries.iter().map(|(k, m)| (k.to_string(), *m)).collect()
    }

    #[test]
    fn test_sentinel_becomes_null() {
        let df = df! {
            "a" => [1i64, -200, 3],
            "b" => [0.5, 1.5, -200.0],
        }
        .unwrap();

        let cleaned = normalize_missing(&df).unwrap();
        assert_eq!(cleaned.column("a").unwrap().dtype(), &DataType::Float64);
        assert_eq!(cleaned.column("a").unwrap().null_count(), 1);
        assert_eq!(cleaned.column("b").unwrap().null_count(), 1);
    }

    #[test]
    fn test_non_numeric_rejected() {
        let df = df! { "when" => ["10/03/2004", "11/03/2004"] }.unwrap();
        assert!(matches!(normalize_missing(&df), Err(PipelineError::DataShape(_))));
    }

    #[test]
    fn test_mean_median_mode() {
        let df = df! {
            "mean" => [Some(1.0), None, Some(3.0)],
            "median" => [Some(1.0), Some(10.0), None],
            "mode" => [Some(2.0), Some(1.0), None],
        }
        .unwrap();

        let mut imputer = Imputer::new(methods(&[
            ("mean", ImputeMethod::Mean),
            ("median", ImputeMethod::Median),
            ("mode", ImputeMethod::Mode),
        ]));
        let out = imputer.fit_transform(&df).unwrap();

        assert_eq!(imputer.fill_values()["mean"], 2.0);
        assert_eq!(imputer.fill_values()["median"], 5.5);
        // 1.0 and 2.0 both appear once
        assert_eq!(imputer.fill_values()["mode"], 1.0);

        for name in ["mean", "median", "mode"] {
            assert_eq!(out.column(name).unwrap().null_count(), 0);
        }
    }

    #[test]
    fn test_mode_picks_most_frequent() {
        assert_eq!(fill_value(&[5.0, 3.0, 5.0, 3.0, 5.0], ImputeMethod::Mode), Some(5.0));
        assert_eq!(fill_value(&[4.0, 4.0, 9.0, 9.0], ImputeMethod::Mode), Some(4.0));
    }

    #[test]
    fn test_all_missing_is_imputation_error() {
        let df = df! { "a" => [None::<f64>, None] }.unwrap();
        let mut imputer = Imputer::new(methods(&[("a", ImputeMethod::Mean)]));
        let err = imputer.fit(&df).unwrap_err();
        assert!(matches!(err, PipelineError::Imputation { .. }));
    }

    #[test]
    fn test_absent_column_is_shape_error() {
        let df = df! { "a" => [1.0] }.unwrap();
        let mut imputer = Imputer::new(methods(&[("b", ImputeMethod::Median)]));
        assert!(matches!(imputer.fit(&df), Err(PipelineError::DataShape(_))));
    }

    #[test]
    fn test_transform_requires_fit() {
        let df = df! { "a" => [1.0] }.unwrap();
        let imputer = Imputer::new(methods(&[("a", ImputeMethod::Mean)]));
        assert!(matches!(imputer.transform(&df), Err(PipelineError::ModelNotFitted)));
    }
}

//! Min-max feature scaling

use crate::error::{PipelineError, Result};
use crate::utils::ensure_parent_dir;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Fitted parameters of one column: `(x - min) / scale`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnScale {
    pub min: f64,
    /// `max - min`, or 1 for a constant column
    pub scale: f64,
}

impl ColumnScale {
    pub fn apply(&self, x: f64) -> f64 {
        (x - self.min) / self.scale
    }
}

/// Min-max scaler. Values outside the fitted range are not clipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    columns: Vec<String>,
    params: BTreeMap<String, ColumnScale>,
    is_fitted: bool,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to every column of `df`
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.columns.clear();
        self.params.clear();

        for column in df.get_columns() {
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            let ca = series.f64()?;
            let (min, max) = match (ca.min(), ca.max()) {
                (Some(min), Some(max)) => (min, max),
                _ => {
                    return Err(PipelineError::DataShape(format!(
                        "cannot fit scaler on column '{}' with no values",
                        series.name()
                    )))
                }
            };
            let range = max - min;
            let name = series.name().to_string();
            self.params.insert(
                name.clone(),
                ColumnScale {
                    min,
                    scale: if range == 0.0 { 1.0 } else { range },
                },
            );
            self.columns.push(name);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Scale the fitted columns of `df`, keeping column order.
    /// Every fitted column must be present.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .columns
            .iter()
            .map(|name| {
                let column = df.column(name).map_err(|_| {
                    PipelineError::DataShape(format!("column '{}' missing from table to scale", name))
                })?;
                let series = column.as_materialized_series().cast(&DataType::Float64)?;
                let params = self.params[name];
                let scaled: Float64Chunked = series
                    .f64()?
                    .into_iter()
                    .map(|opt| opt.map(|v| params.apply(v)))
                    .collect();
                Ok(scaled.with_name(series.name().clone()).into_series())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Scale a single value of a fitted column
    pub fn scale_value(&self, column: &str, value: f64) -> Result<f64> {
        self.params
            .get(column)
            .map(|p| p.apply(value))
            .ok_or_else(|| PipelineError::ColumnNotFound(column.to_string()))
    }

    pub fn params(&self, column: &str) -> Option<&ColumnScale> {
        self.params.get(column)
    }

    /// Fitted column names, in fit order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Persist the fitted parameters as JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        if !self.is_fitted {
            return Err(PipelineError::ModelNotFitted);
        }
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

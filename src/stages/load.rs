//! Raw ingestion: normalize the export into the canonical wide table

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::utils::{column_names, DataLoader, DataSaver};
use polars::prelude::*;
use std::collections::HashMap;
use tracing::info;

/// Summary of a load run
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_written: usize,
    pub columns: Vec<String>,
}

/// `PT08.S1(CO)` -> `PT08_S1_CO_`
pub fn normalize_column_name(name: &str) -> String {
    name.replace(['(', ')', '.'], "_")
}

/// Keep the expected columns (matched after name normalization) in the given
/// order and drop rows where every field is missing.
pub fn clean_raw_table(raw: &DataFrame, expected: &[String]) -> Result<DataFrame> {
    let by_normalized: HashMap<String, String> = column_names(raw)
        .into_iter()
        .map(|name| (normalize_column_name(&name), name))
        .collect();

    let mut selected = Vec::with_capacity(expected.len());
    let mut missing = Vec::new();
    for wanted in expected {
        match by_normalized.get(wanted) {
            Some(original) => {
                let column = raw.column(original)?.clone();
                selected.push(column.with_name(wanted.as_str().into()));
            }
            None => missing.push(wanted.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(PipelineError::DataShape(format!(
            "raw table is missing expected columns: {}",
            missing.join(", ")
        )));
    }

    let table = DataFrame::new(selected)?;

    let mut keep = vec![false; table.height()];
    for column in table.get_columns() {
        let observed = column.as_materialized_series().is_not_null();
        for (flag, present) in keep.iter_mut().zip(observed.into_iter()) {
            *flag |= present.unwrap_or(false);
        }
    }
    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(table.filter(&mask)?)
}

/// Read the raw export, clean it and write the canonical table
pub fn run(config: &PipelineConfig) -> Result<LoadReport> {
    let cfg = config.data_load()?;

    info!(path = %cfg.dataset_csv.display(), "Loading raw dataset");
    let raw = DataLoader::new()
        .with_separator(cfg.separator)?
        .with_decimal_comma(cfg.decimal_comma)
        .load_csv(&cfg.dataset_csv)?;

    let mut cleaned = clean_raw_table(&raw, &cfg.expected_columns())?;
    info!(
        rows_read = raw.height(),
        rows_written = cleaned.height(),
        columns = cleaned.width(),
        "Raw dataset cleaned"
    );

    DataSaver::save_csv(&mut cleaned, &cfg.dataset_csv_cleaned)?;
    info!(path = %cfg.dataset_csv_cleaned.display(), "Cleaned dataset saved");

    Ok(LoadReport {
        rows_read: raw.height(),
        rows_written: cleaned.height(),
        columns: column_names(&cleaned),
    })
}

//! Table IO and DataFrame/ndarray conversion

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// CSV reader for pipeline artifacts and raw exports
#[derive(Debug, Clone)]
pub struct DataLoader {
    separator: u8,
    decimal_comma: bool,
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Comma-separated, dot decimals: the format every stage writes
    pub fn new() -> Self {
        Self {
            separator: b',',
            decimal_comma: false,
            infer_schema_length: Some(1000),
        }
    }

    pub fn with_separator(mut self, separator: char) -> Result<Self> {
        if !separator.is_ascii() {
            return Err(PipelineError::Config(format!(
                "separator '{}' must be a single ASCII character",
                separator
            )));
        }
        self.separator = separator as u8;
        Ok(self)
    }

    /// Parse `2,6` as 2.6
    pub fn with_decimal_comma(mut self, decimal_comma: bool) -> Self {
        self.decimal_comma = decimal_comma;
        self
    }

    /// Load a CSV file with a header row
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let parse_opts = CsvParseOptions::default()
            .with_separator(self.separator)
            .with_decimal_comma(self.decimal_comma);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
        Ok(df)
    }
}

/// CSV writer for pipeline artifacts
pub struct DataSaver;

impl DataSaver {
    /// Write `df` as CSV, creating parent directories as needed
    pub fn save_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file).include_header(true).finish(df)?;

        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Wrote CSV");
        Ok(())
    }
}

/// Create the parent directory of `path` if it does not exist
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Column names of `df` as owned strings, in table order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Values of a numeric column cast to f64; nulls are kept
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

/// Extract a fully observed numeric column into an `Array1<f64>`
pub fn column_to_array1(df: &DataFrame, name: &str) -> Result<Array1<f64>> {
    column_values(df, name)?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                PipelineError::Data(format!("column '{}' contains missing values", name))
            })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Array1::from_vec)
}

/// Extract named columns into a row-major `Array2<f64>`.
/// Missing values are an error; model fitting never sees nulls.
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Array1<f64>> = col_names
        .iter()
        .map(|name| column_to_array1(df, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

/// Build a Float64 DataFrame from a row-major matrix and its column names
pub fn array2_to_frame(col_names: &[String], x: &Array2<f64>) -> Result<DataFrame> {
    if col_names.len() != x.ncols() {
        return Err(PipelineError::Shape {
            expected: format!("{} columns", col_names.len()),
            actual: format!("{} columns", x.ncols()),
        });
    }
    let columns: Vec<Column> = col_names
        .iter()
        .zip(x.columns())
        .map(|(name, values)| Column::new(name.as_str().into(), values.to_vec()))
        .collect();
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_save_and_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("table.csv");

        let mut df = df! {
            "a" => [1.0, 2.0, 3.0],
            "b" => [4.0, 5.0, 6.0],
        }
        .unwrap();
        DataSaver::save_csv(&mut df, &path).unwrap();

        let loaded = DataLoader::new().load_csv(&path).unwrap();
        assert_eq!(loaded.height(), 3);
        assert_eq!(column_names(&loaded), vec!["a", "b"]);
        assert_eq!(column_to_array1(&loaded, "b").unwrap().to_vec(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_semicolon_decimal_comma() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "x;y").unwrap();
        writeln!(file, "2,5;1").unwrap();
        writeln!(file, "-200;3,25").unwrap();
        file.flush().unwrap();

        let df = DataLoader::new()
            .with_separator(';')
            .unwrap()
            .with_decimal_comma(true)
            .load_csv(file.path())
            .unwrap();

        assert_eq!(column_to_array1(&df, "x").unwrap().to_vec(), vec![2.5, -200.0]);
        assert_eq!(column_to_array1(&df, "y").unwrap().to_vec(), vec![1.0, 3.25]);
    }

    #[test]
    fn test_columns_to_array2_row_major() {
        let df = df! {
            "a" => [1.0, 2.0],
            "b" => [10.0, 20.0],
        }
        .unwrap();
        let names = vec!["b".to_string(), "a".to_string()];
        let x = columns_to_array2(&df, &names).unwrap();
        assert_eq!(x, ndarray::array![[10.0, 1.0], [20.0, 2.0]]);

        let back = array2_to_frame(&names, &x).unwrap();
        assert_eq!(column_names(&back), names);
    }

    #[test]
    fn test_missing_values_rejected() {
        let df = df! { "a" => [Some(1.0), None] }.unwrap();
        assert!(matches!(column_to_array1(&df, "a"), Err(PipelineError::Data(_))));
        assert!(matches!(
            column_to_array1(&df, "zzz"),
            Err(PipelineError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = DataLoader::new().load_csv("/nonexistent/x.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}

//! Sigma-rule outlier rejection
//!
//! Columns are filtered one after another. Each step computes its bounds on
//! the table left over by the previous step, so a row removed early never
//! influences the statistics of later columns.

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What one column's filter did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierStep {
    pub column: String,
    pub mean: f64,
    pub std: f64,
    pub lower: f64,
    pub upper: f64,
    pub rows_before: usize,
    pub rows_after: usize,
    /// Rows dropped because the value was missing
    pub dropped_missing: usize,
    /// σ was not finite, so the column was left alone
    pub skipped: bool,
}

impl OutlierStep {
    pub fn rows_removed(&self) -> usize {
        self.rows_before - self.rows_after
    }
}

/// Keeps rows within `[µ - kσ, µ + kσ]` of every numeric column
#[derive(Debug, Clone)]
pub struct SigmaFilter {
    k: f64,
}

impl SigmaFilter {
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    /// Fold over the columns of `df` in table order.
    ///
    /// σ is the sample standard deviation (ddof = 1). Rows with a null in the
    /// column being filtered are dropped.
    pub fn apply(&self, df: &DataFrame) -> Result<(DataFrame, Vec<OutlierStep>)> {
        let names: Vec<PlSmallStr> = df.get_column_names().into_iter().cloned().collect();
        let mut current = df.clone();
        let mut steps = Vec::with_capacity(names.len());

        for name in &names {
            let (next, step) = self.filter_column(&current, name)?;

            if step.skipped {
                warn!(column = %name, "Standard deviation undefined, outlier filter skipped");
            } else {
                if step.dropped_missing > 0 {
                    warn!(
                        column = %name,
                        dropped = step.dropped_missing,
                        "Rows with missing values dropped by outlier filter"
                    );
                }
                debug!(
                    column = %name,
                    mean = step.mean,
                    std = step.std,
                    lower = step.lower,
                    upper = step.upper,
                    removed = step.rows_removed(),
                    "Outlier filter applied"
                );
            }

            current = next;
            steps.push(step);
        }

        Ok((current, steps))
    }

    fn filter_column(&self, df: &DataFrame, name: &PlSmallStr) -> Result<(DataFrame, OutlierStep)> {
        let series = df.column(name)?.as_materialized_series().cast(&DataType::Float64)?;
        let ca = series.f64()?;
        let rows_before = df.height();

        let mean = ca.mean().unwrap_or(f64::NAN);
        let std = ca.std(1).unwrap_or(f64::NAN);

        if !(mean.is_finite() && std.is_finite()) {
            let step = OutlierStep {
                column: name.to_string(),
                mean,
                std,
                lower: f64::NAN,
                upper: f64::NAN,
                rows_before,
                rows_after: rows_before,
                dropped_missing: 0,
                skipped: true,
            };
            return Ok((df.clone(), step));
        }

        let lower = mean - self.k * std;
        let upper = mean + self.k * std;

        let mask: BooleanChunked = ca
            .into_iter()
            .map(|v| Some(matches!(v, Some(x) if x >= lower && x <= upper)))
            .collect();
        let filtered = df.filter(&mask)?;

        let step = OutlierStep {
            column: name.to_string(),
            mean,
            std,
            lower,
            upper,
            rows_before,
            rows_after: filtered.height(),
            dropped_missing: ca.null_count(),
            skipped: false,
        };
        Ok((filtered, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extreme_value_removed() {
        let mut values: Vec<f64> = (0..100).map(|i| 10.0 + (i % 10) as f64).collect();
        values[50] = 14.5 * 1500.0;
        let other: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let df = df! { "a" => values, "b" => other }.unwrap();

        let (out, steps) = SigmaFilter::new(4.0).apply(&df).unwrap();
        assert_eq!(out.height(), 99);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].rows_removed(), 1);
        assert_eq!(steps[1].rows_before, 99);
        assert_eq!(steps[1].rows_removed(), 0);
    }

    #[test]
    fn test_retained_rows_within_bounds() {
        let a: Vec<f64> = (0..50).map(|i| if i == 7 { 1e6 } else { i as f64 }).collect();
        let b: Vec<f64> = (0..50).map(|i| if i == 20 { -1e6 } else { (i * 3 % 17) as f64 }).collect();
        let df = df! { "a" => a, "b" => b }.unwrap();

        let (out, steps) = SigmaFilter::new(3.0).apply(&df).unwrap();
        for step in &steps {
            let col = out.column(&step.column).unwrap().f64().unwrap().clone();
            for v in col.into_iter().flatten() {
                assert!(v >= step.lower && v <= step.upper);
            }
        }
        assert!(steps[0].rows_before >= steps[0].rows_after);
        assert_eq!(steps[1].rows_before, steps[0].rows_after);
    }

    #[test]
    fn test_bounds_follow_the_shrinking_table() {
        // row 0 is extreme in both columns; once `a` drops it, 30.0 stands out in `b`
        let a: Vec<f64> = (0..20).map(|i| if i == 0 { 1e6 } else { i as f64 }).collect();
        let b: Vec<f64> = (0..20)
            .map(|i| match i {
                0 => 1000.0,
                1 => 30.0,
                _ => (i % 5) as f64,
            })
            .collect();
        let df = df! { "a" => a, "b" => b.clone() }.unwrap();

        let (out, steps) = SigmaFilter::new(3.0).apply(&df).unwrap();
        assert_eq!(steps[0].rows_removed(), 1);
        assert_eq!(steps[1].rows_before, 19);

        let survivors = &b[1..];
        let n = survivors.len() as f64;
        let mean = survivors.iter().sum::<f64>() / n;
        let std = (survivors.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
        assert!((steps[1].mean - mean).abs() < 1e-9);
        assert!((steps[1].std - std).abs() < 1e-9);

        assert_eq!(steps[1].rows_removed(), 1);
        assert_eq!(out.height(), 18);
        let kept: Vec<f64> = out.column("b").unwrap().f64().unwrap().into_iter().flatten().collect();
        assert!(!kept.contains(&30.0));
    }

    #[test]
    fn test_missing_rows_dropped() {
        let df = df! {
            "a" => [Some(1.0), None, Some(2.0), Some(1.5)],
        }
        .unwrap();
        let (out, steps) = SigmaFilter::new(4.0).apply(&df).unwrap();
        assert_eq!(out.height(), 3);
        assert_eq!(steps[0].dropped_missing, 1);
    }

    #[test]
    fn test_single_row_column_skipped() {
        let df = df! { "a" => [3.0] }.unwrap();
        let (out, steps) = SigmaFilter::new(4.0).apply(&df).unwrap();
        assert_eq!(out.height(), 1);
        assert!(steps[0].skipped);
    }

    #[test]
    fn test_constant_column_keeps_everything() {
        let df = df! { "a" => [2.0, 2.0, 2.0] }.unwrap();
        let (out, _) = SigmaFilter::new(4.0).apply(&df).unwrap();
        assert_eq!(out.height(), 3);
    }
}

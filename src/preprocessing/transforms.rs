//! Skew correction with the Box-Cox power transform

use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const LAMBDA_MIN: f64 = -2.0;
const LAMBDA_MAX: f64 = 2.0;
const LAMBDA_STEP: f64 = 0.1;
const LAMBDA_LIMIT: f64 = 50.0;

/// Sample skewness (adjusted Fisher-Pearson, G1).
///
/// `None` for fewer than three values. A constant column has skew 0.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let m2 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - mean).powi(3)).sum::<f64>() / nf;

    if m2 <= f64::EPSILON * mean.abs().max(1.0) {
        return Some(0.0);
    }
    let g1 = m3 / m2.powf(1.5);
    Some((nf * (nf - 1.0)).sqrt() / (nf - 2.0) * g1)
}

/// Box-Cox transform of a single strictly positive value
pub fn boxcox_value(x: f64, lambda: f64) -> f64 {
    if lambda.abs() < 1e-10 {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    }
}

/// Profile log-likelihood of λ for strictly positive `values`
fn boxcox_log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let transformed: Vec<f64> = values.iter().map(|&x| boxcox_value(x, lambda)).collect();

    let mean = transformed.iter().sum::<f64>() / n;
    let variance = transformed.iter().map(|&t| (t - mean).powi(2)).sum::<f64>() / n;
    if !(variance > 0.0) || !variance.is_finite() {
        return f64::NEG_INFINITY;
    }

    let log_jacobian: f64 = values.iter().map(|&x| x.ln()).sum();
    -n / 2.0 * variance.ln() + (lambda - 1.0) * log_jacobian
}

/// λ maximizing the Box-Cox log-likelihood.
///
/// A coarse grid over [-2, 2] locates the peak. The bracket around it is
/// widened outward while the likelihood keeps rising, so optima outside the
/// grid are reached, then golden-section search refines inside the bracket.
pub fn boxcox_lambda(values: &[f64]) -> f64 {
    let steps = ((LAMBDA_MAX - LAMBDA_MIN) / LAMBDA_STEP).round() as i32;
    let mut best_lambda = 1.0;
    let mut best_ll = f64::NEG_INFINITY;
    for i in 0..=steps {
        let lambda = LAMBDA_MIN + i as f64 * LAMBDA_STEP;
        let ll = boxcox_log_likelihood(values, lambda);
        if ll > best_ll {
            best_ll = ll;
            best_lambda = lambda;
        }
    }

    let (mut lo, mut hi) = bracket_peak(values, best_lambda, best_ll);
    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;
    let mut c = hi - inv_phi * (hi - lo);
    let mut d = lo + inv_phi * (hi - lo);
    let mut fc = boxcox_log_likelihood(values, c);
    let mut fd = boxcox_log_likelihood(values, d);

    while hi - lo > 1e-6 {
        if fc > fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - inv_phi * (hi - lo);
            fc = boxcox_log_likelihood(values, c);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + inv_phi * (hi - lo);
            fd = boxcox_log_likelihood(values, d);
        }
    }

    let refined = (lo + hi) / 2.0;
    if boxcox_log_likelihood(values, refined) >= best_ll {
        refined
    } else {
        best_lambda
    }
}

/// Interval around `center` whose interior holds a likelihood peak.
///
/// Steps double while the likelihood keeps rising in one direction; the walk
/// stops at ±`LAMBDA_LIMIT` or once powers overflow.
fn bracket_peak(values: &[f64], center: f64, center_ll: f64) -> (f64, f64) {
    let ll = |lambda: f64| boxcox_log_likelihood(values, lambda);
    let mut step = LAMBDA_STEP;
    let (mut lo, mut mid, mut hi) = (center - step, center, center + step);
    let mut mid_ll = center_ll;

    let mut hi_ll = ll(hi);
    while hi_ll > mid_ll && hi < LAMBDA_LIMIT {
        lo = mid;
        mid = hi;
        mid_ll = hi_ll;
        step *= 2.0;
        hi = mid + step;
        hi_ll = ll(hi);
    }

    let mut lo_ll = ll(lo);
    while lo_ll > mid_ll && lo > -LAMBDA_LIMIT {
        hi = mid;
        mid = lo;
        mid_ll = lo_ll;
        step *= 2.0;
        lo = mid - step;
        lo_ll = ll(lo);
    }

    (lo, hi)
}

/// What happened to one feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkewOutcome {
    Transformed,
    /// Skewed, but Box-Cox needs strictly positive values
    NonPositive,
    BelowThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkewEntry {
    pub column: String,
    pub skew_before: Option<f64>,
    pub skew_after: Option<f64>,
    pub lambda: Option<f64>,
    pub outcome: SkewOutcome,
}

/// Box-Cox transforms the columns whose |skew| exceeds a threshold
#[derive(Debug, Clone)]
pub struct SkewCorrector {
    threshold: f64,
}

impl SkewCorrector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Transform every qualifying column of `df`, leaving the others as is
    pub fn apply(&self, df: &DataFrame) -> Result<(DataFrame, Vec<SkewEntry>)> {
        let mut result = df.clone();
        let mut entries = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            let name = series.name().to_string();
            let ca = series.f64()?;
            let values: Vec<f64> = ca.into_iter().flatten().collect();
            let skew_before = skewness(&values);

            let skewed = matches!(skew_before, Some(s) if s.abs() > self.threshold);
            if !skewed {
                entries.push(SkewEntry {
                    column: name,
                    skew_before,
                    skew_after: None,
                    lambda: None,
                    outcome: SkewOutcome::BelowThreshold,
                });
                continue;
            }

            if ca.null_count() > 0 || values.iter().any(|&v| v <= 0.0) {
                warn!(
                    column = %name,
                    skew = skew_before,
                    "Skewed column has non-positive values, Box-Cox not applied"
                );
                entries.push(SkewEntry {
                    column: name,
                    skew_before,
                    skew_after: None,
                    lambda: None,
                    outcome: SkewOutcome::NonPositive,
                });
                continue;
            }

            let lambda = boxcox_lambda(&values);
            let transformed: Vec<f64> = values.iter().map(|&x| boxcox_value(x, lambda)).collect();
            let skew_after = skewness(&transformed);

            info!(
                column = %name,
                skew_before = skew_before,
                skew_after = skew_after,
                lambda,
                "Box-Cox transform applied"
            );

            result.with_column(Series::new(series.name().clone(), transformed))?;
            entries.push(SkewEntry {
                column: name,
                skew_before,
                skew_after,
                lambda: Some(lambda),
                outcome: SkewOutcome::Transformed,
            });
        }

        if !entries.iter().any(|e| e.outcome == SkewOutcome::Transformed) {
            info!(threshold = self.threshold, "No column exceeded the skew threshold, nothing transformed");
        }

        Ok((result, entries))
    }
}

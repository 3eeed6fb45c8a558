//! Regression scoring

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Scores of one prediction set against its ground truth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub r2: f64,
    pub rmse: f64,
    pub mae: f64,
    pub n_samples: usize,
}

impl RegressionMetrics {
    /// Compute R², RMSE and MAE in one pass over the residuals
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        check_lengths(y_true, y_pred)?;

        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| t - p)
            .collect();

        let ss_res: f64 = errors.iter().map(|e| e * e).sum();
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        Ok(Self {
            r2: r2_from_parts(y_true, ss_res),
            rmse: (ss_res / n).sqrt(),
            mae,
            n_samples: y_true.len(),
        })
    }
}

/// Coefficient of determination.
///
/// A constant target has no variance to explain: a perfect prediction of it
/// scores 1.0, anything else 0.0.
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let ss_res: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok(r2_from_parts(y_true, ss_res))
}

pub fn rmse(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(RegressionMetrics::compute(y_true, y_pred)?.rmse)
}

pub fn mae(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    Ok(RegressionMetrics::compute(y_true, y_pred)?.mae)
}

fn r2_from_parts(y_true: &Array1<f64>, ss_res: f64) -> f64 {
    let n = y_true.len() as f64;
    let y_mean = y_true.sum() / n;
    let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();

    if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    }
}

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::Shape {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::Data("cannot score an empty prediction set".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_prediction() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let m = RegressionMetrics::compute(&y, &y).unwrap();
        assert_eq!(m.r2, 1.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.n_samples, 4);
    }

    #[test]
    fn test_mean_prediction_scores_zero() {
        let y = array![1.0, 2.0, 3.0, 4.0];
        let pred = Array1::from_elem(4, 2.5);
        let m = RegressionMetrics::compute(&y, &pred).unwrap();
        assert!(m.r2.abs() < 1e-12);
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!((m.rmse - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_known_values() {
        let y = array![3.0, -0.5, 2.0, 7.0];
        let pred = array![2.5, 0.0, 2.0, 8.0];
        assert!((r2_score(&y, &pred).unwrap() - 0.948_608_137_044_967_9).abs() < 1e-12);
        assert!((mae(&y, &pred).unwrap() - 0.5).abs() < 1e-12);
        assert!((rmse(&y, &pred).unwrap() - 0.375f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_constant_target() {
        let y = array![2.0, 2.0, 2.0];
        assert_eq!(r2_score(&y, &y).unwrap(), 1.0);
        assert_eq!(r2_score(&y, &array![2.0, 2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        let err = r2_score(&array![1.0, 2.0], &array![1.0]).unwrap_err();
        assert!(matches!(err, PipelineError::Shape { .. }));

        let empty = Array1::<f64>::zeros(0);
        assert!(RegressionMetrics::compute(&empty, &empty).is_err());
    }
}

//! Model evaluation on the train and test partitions

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::stages::train::{target_name, ModelArtifact};
use crate::training::RegressionMetrics;
use crate::utils::{column_to_array1, columns_to_array2, ensure_parent_dir, DataLoader};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// One metric on both partitions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitScore {
    #[serde(rename = "Train")]
    pub train: f64,
    #[serde(rename = "Test")]
    pub test: f64,
}

/// Metrics document written to `<reports_dir>/<metrics_file>`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    #[serde(rename = "R2")]
    pub r2: SplitScore,
    #[serde(rename = "RMSE")]
    pub rmse: SplitScore,
    #[serde(rename = "MAE")]
    pub mae: SplitScore,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

impl MetricsReport {
    /// Combine both partitions' scores, rounded to 4 decimals
    pub fn from_metrics(train: &RegressionMetrics, test: &RegressionMetrics) -> Self {
        let pair = |a: f64, b: f64| SplitScore {
            train: round4(a),
            test: round4(b),
        };
        Self {
            r2: pair(train.r2, test.r2),
            rmse: pair(train.rmse, test.rmse),
            mae: pair(train.mae, test.mae),
        }
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<8}{:>10}{:>10}", "Metric", "Train", "Test")?;
        for (name, score) in [("R2", self.r2), ("RMSE", self.rmse), ("MAE", self.mae)] {
            writeln!(f, "{:<8}{:>10.4}{:>10.4}", name, score.train, score.test)?;
        }
        Ok(())
    }
}

/// Refit the artifact's model on the training partition, then score it on
/// both partitions.
pub fn fit_then_score(
    artifact: &ModelArtifact,
    x_train: &Array2<f64>,
    y_train: &Array1<f64>,
    x_test: &Array2<f64>,
    y_test: &Array1<f64>,
) -> Result<MetricsReport> {
    let mut model = artifact.model.clone();
    model.fit(x_train, y_train)?;

    let train = RegressionMetrics::compute(y_train, &model.predict(x_train)?)?;
    let test = RegressionMetrics::compute(y_test, &model.predict(x_test)?)?;
    Ok(MetricsReport::from_metrics(&train, &test))
}

/// Score the persisted model and write the metrics document
pub fn run(config: &PipelineConfig) -> Result<MetricsReport> {
    let split = config.data_split()?;
    let train_cfg = config.train()?;
    let cfg = config.evaluate()?;

    let loader = DataLoader::new();
    let x_train_df = loader.load_csv(&split.x_train_scaled_path)?;
    let x_test_df = loader.load_csv(&split.x_test_scaled_path)?;
    let y_train_df = loader.load_csv(&split.y_train_path)?;
    let y_test_df = loader.load_csv(&split.y_test_path)?;

    info!(path = %train_cfg.model_path.display(), "Loading model");
    let artifact = ModelArtifact::load(&train_cfg.model_path)?;
    artifact.check_features(&x_train_df)?;
    artifact.check_features(&x_test_df)?;

    let features = &artifact.feature_names;
    let x_train = columns_to_array2(&x_train_df, features)?;
    let x_test = columns_to_array2(&x_test_df, features)?;
    let y_train = column_to_array1(&y_train_df, &target_name(&y_train_df)?)?;
    let y_test = column_to_array1(&y_test_df, &target_name(&y_test_df)?)?;

    let report = fit_then_score(&artifact, &x_train, &y_train, &x_test, &y_test)?;
    info!(
        r2_train = report.r2.train,
        r2_test = report.r2.test,
        rmse_test = report.rmse.test,
        mae_test = report.mae.test,
        "Evaluation finished"
    );

    let metrics_path = cfg.metrics_path();
    report.save_json(&metrics_path)?;
    info!(path = %metrics_path.display(), "Metrics saved");

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_layout() {
        let m = RegressionMetrics {
            r2: 0.912_345_67,
            rmse: 0.25,
            mae: 0.123_449,
            n_samples: 10,
        };
        let report = MetricsReport::from_metrics(&m, &m);
        let json: serde_json::Value = serde_json::to_value(report).unwrap();

        assert_eq!(json["R2"]["Train"], 0.9123);
        assert_eq!(json["RMSE"]["Test"], 0.25);
        assert_eq!(json["MAE"]["Train"], 0.1234);
    }

    #[test]
    fn test_display_table() {
        let m = RegressionMetrics { r2: 1.0, rmse: 0.0, mae: 0.0, n_samples: 1 };
        let table = MetricsReport::from_metrics(&m, &m).to_string();
        assert!(table.starts_with("Metric"));
        assert!(table.contains("R2"));
        assert!(table.contains("1.0000"));
    }

    #[test]
    fn test_save_json_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("metrics.json");
        let m = RegressionMetrics { r2: 0.5, rmse: 1.0, mae: 0.5, n_samples: 1 };
        MetricsReport::from_metrics(&m, &m).save_json(&path).unwrap();

        let loaded: MetricsReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.r2.test, 0.5);
    }
}

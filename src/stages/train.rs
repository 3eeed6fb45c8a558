//! Model selection and persistence

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::training::{describe_candidate, EstimatorKind, ForestParams, GridSearch, RandomForest};
use crate::utils::{column_names, column_to_array1, columns_to_array2, ensure_parent_dir, DataLoader};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Fitted model plus everything needed to reuse it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub estimator: EstimatorKind,
    pub params: ForestParams,
    /// Selected grid point as `name=value` pairs
    pub candidate: Vec<(String, String)>,
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub cv_score: f64,
    pub random_state: u64,
    pub model: RandomForest,
}

impl ModelArtifact {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Check that `df` has exactly the feature columns the model was fit on
    pub fn check_features(&self, df: &DataFrame) -> Result<()> {
        let names = column_names(df);
        if names != self.feature_names {
            return Err(PipelineError::DataShape(format!(
                "feature columns {:?} do not match the model's {:?}",
                names, self.feature_names
            )));
        }
        Ok(())
    }
}

/// Single target column of a y table
pub fn target_name(y: &DataFrame) -> Result<String> {
    match column_names(y).as_slice() {
        [name] => Ok(name.clone()),
        other => Err(PipelineError::DataShape(format!(
            "target table must have exactly one column, found {}",
            other.len()
        ))),
    }
}

/// Grid search on the scaled training partition and persist the winner
pub fn run(config: &PipelineConfig) -> Result<ModelArtifact> {
    let split = config.data_split()?;
    let cfg = config.train()?;

    let loader = DataLoader::new();
    let x_df = loader.load_csv(&split.x_train_scaled_path)?;
    let y_df = loader.load_csv(&split.y_train_path)?;
    if x_df.height() != y_df.height() {
        return Err(PipelineError::DataShape(format!(
            "X_train has {} rows but y_train has {}",
            x_df.height(),
            y_df.height()
        )));
    }

    let feature_names = column_names(&x_df);
    let target = target_name(&y_df)?;
    let x = columns_to_array2(&x_df, &feature_names)?;
    let y = column_to_array1(&y_df, &target)?;

    let estimator = cfg.estimator()?;
    let search = GridSearch::new(estimator, cfg.param_grid()?, cfg.cv)
        .with_random_state(config.base.random_state)
        .with_n_jobs(cfg.n_jobs);
    let result = search.fit(&x, &y)?;

    info!(
        estimator = %estimator,
        best = %describe_candidate(&result.best_candidate),
        cv_r2 = result.best_score,
        "Best model selected"
    );
    if let Some(importances) = result.best_model.feature_importances() {
        for (feature, importance) in feature_names.iter().zip(importances) {
            debug!(feature = %feature, importance, "Feature importance");
        }
    }

    let artifact = ModelArtifact {
        estimator,
        params: result.best_params,
        candidate: result
            .best_candidate
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect(),
        feature_names,
        target_name: target,
        cv_score: result.best_score,
        random_state: config.base.random_state,
        model: result.best_model,
    };
    artifact.save(&cfg.model_path)?;
    info!(path = %cfg.model_path.display(), "Model saved");

    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn artifact() -> ModelArtifact {
        let x = array![[0.0, 1.0], [1.0, 0.0], [0.5, 0.5], [0.2, 0.9]];
        let y = array![1.0, 2.0, 1.5, 1.1];
        let params = ForestParams {
            n_estimators: 3,
            ..ForestParams::default()
        };
        let mut model = params.build(7);
        model.fit(&x, &y).unwrap();
        ModelArtifact {
            estimator: EstimatorKind::RandomForest,
            params,
            candidate: vec![("n_estimators".to_string(), "3".to_string())],
            feature_names: vec!["a".to_string(), "b".to_string()],
            target_name: "t".to_string(),
            cv_score: 0.5,
            random_state: 7,
            model,
        }
    }

    #[test]
    fn test_artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.bin");

        let original = artifact();
        original.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_save_reports_write_failure() {
        // every write to /dev/full fails with ENOSPC
        let err = artifact().save("/dev/full").unwrap_err();
        assert!(matches!(err, PipelineError::Io(_) | PipelineError::Serialization(_)));
    }

    #[test]
    fn test_check_features() {
        let a = artifact();
        assert!(a.check_features(&df! { "a" => [1.0], "b" => [2.0] }.unwrap()).is_ok());
        assert!(matches!(
            a.check_features(&df! { "b" => [1.0], "a" => [2.0] }.unwrap()),
            Err(PipelineError::DataShape(_))
        ));
    }

    #[test]
    fn test_target_name() {
        assert_eq!(target_name(&df! { "CO_GT_" => [1.0] }.unwrap()).unwrap(), "CO_GT_");
        assert!(target_name(&df! { "a" => [1.0], "b" => [1.0] }.unwrap()).is_err());
    }
}

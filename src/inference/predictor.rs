//! Single-row prediction
//!
//! A row is a JSON object holding one value per feature column, expressed
//! in the same space as the feature table written by featurize (before
//! scaling). The row is scaled with the persisted train-fitted scaler and
//! fed to the model.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::MinMaxScaler;
use crate::stages::ModelArtifact;
use ndarray::Array2;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{debug, info};

/// Model and scaler ready to answer prediction requests
#[derive(Debug, Clone)]
pub struct Predictor {
    artifact: ModelArtifact,
    scaler: MinMaxScaler,
}

/// A prediction keyed by the target column name
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub target: String,
    pub value: f64,
}

impl Prediction {
    /// `{"<target>": value}`
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.target.clone(), Value::from(self.value));
        Value::Object(map)
    }
}

/// Collapse any internal failure into the boundary's single error kind
fn boundary(err: PipelineError) -> PipelineError {
    match err {
        PipelineError::Inference(_) => err,
        other => PipelineError::Inference(other.to_string()),
    }
}

impl Predictor {
    pub fn new(artifact: ModelArtifact, scaler: MinMaxScaler) -> Result<Self> {
        let missing: Vec<&str> = artifact
            .feature_names
            .iter()
            .filter(|name| scaler.params(name).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Inference(format!(
                "scaler has no parameters for features: {}",
                missing.join(", ")
            )));
        }
        if !artifact.model.is_fitted() {
            return Err(PipelineError::Inference("model artifact is not fitted".to_string()));
        }
        Ok(Self { artifact, scaler })
    }

    /// Load the model artifact and the persisted scaler named by `config`
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let load = || -> Result<Self> {
            let model_path = &config.train()?.model_path;
            let scaler_path = config.data_split()?.scaler_path.as_ref().ok_or_else(|| {
                PipelineError::Config("data_split.scaler_path is not configured".to_string())
            })?;

            let artifact = ModelArtifact::load(model_path)?;
            let scaler = MinMaxScaler::load_json(scaler_path)?;
            info!(
                model = %model_path.display(),
                scaler = %scaler_path.display(),
                features = artifact.feature_names.len(),
                "Predictor loaded"
            );
            Self::new(artifact, scaler)
        };
        load().map_err(boundary)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    pub fn target_name(&self) -> &str {
        &self.artifact.target_name
    }

    /// Predict from a JSON object string
    pub fn predict_json(&self, row: &str) -> Result<Prediction> {
        let value: Value = serde_json::from_str(row)
            .map_err(|e| PipelineError::Inference(format!("row is not valid JSON: {}", e)))?;
        match value {
            Value::Object(map) => self.predict_row(&map),
            _ => Err(PipelineError::Inference("row must be a JSON object".to_string())),
        }
    }

    /// Predict from a parsed JSON object.
    ///
    /// Every feature must be present as a number, and no other field may
    /// appear.
    pub fn predict_row(&self, row: &Map<String, Value>) -> Result<Prediction> {
        let start = Instant::now();
        let features = self.validate(row)?;

        let scaled = features
            .iter()
            .zip(&self.artifact.feature_names)
            .map(|(&v, name)| self.scaler.scale_value(name, v))
            .collect::<Result<Vec<f64>>>()
            .map_err(boundary)?;

        let x = Array2::from_shape_vec((1, scaled.len()), scaled).map_err(|e| boundary(e.into()))?;
        let prediction = self.artifact.model.predict(&x).map_err(boundary)?;
        let value = prediction
            .get(0)
            .copied()
            .ok_or_else(|| PipelineError::Inference("model returned no prediction".to_string()))?;

        debug!(
            target = %self.artifact.target_name,
            value,
            latency_us = start.elapsed().as_micros() as u64,
            "Prediction served"
        );
        Ok(Prediction {
            target: self.artifact.target_name.clone(),
            value,
        })
    }

    fn validate(&self, row: &Map<String, Value>) -> Result<Vec<f64>> {
        let names = &self.artifact.feature_names;

        let unexpected: Vec<&str> = row
            .keys()
            .filter(|k| !names.contains(*k))
            .map(String::as_str)
            .collect();
        if !unexpected.is_empty() {
            return Err(PipelineError::Inference(format!(
                "unexpected fields: {}",
                unexpected.join(", ")
            )));
        }

        let missing: Vec<&str> = names
            .iter()
            .filter(|n| !row.contains_key(n.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Inference(format!(
                "missing fields: {}",
                missing.join(", ")
            )));
        }

        names
            .iter()
            .map(|name| {
                row[name.as_str()]
                    .as_f64()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        PipelineError::Inference(format!("field '{}' must be a finite number", name))
                    })
            })
            .collect()
    }
}

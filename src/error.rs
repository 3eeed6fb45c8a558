//! Error types for the pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for every pipeline stage
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or malformed configuration key, unsupported option
    #[error("Configuration error: {0}")]
    Config(String),

    /// Table does not have the expected schema or shape
    #[error("Data shape error: {0}")]
    DataShape(String),

    #[error("Imputation error: column '{column}': {reason}")]
    Imputation { column: String, reason: String },

    #[error("Data error: {0}")]
    Data(String),

    #[error("Training error: {0}")]
    Training(String),

    /// The only error surfaced by the single-row prediction boundary
    #[error("Prediction failed: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
        PipelineError::Config(err.to_string())
    }
}

impl From<bincode::Error> for PipelineError {
    fn from(err: bincode::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::DataShape("missing column 'T'".to_string());
        assert_eq!(err.to_string(), "Data shape error: missing column 'T'");

        let err = PipelineError::Imputation {
            column: "RH".to_string(),
            reason: "no observed values".to_string(),
        };
        assert_eq!(err.to_string(), "Imputation error: column 'RH': no observed values");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_yaml_error_is_config_error() {
        let yaml_err = serde_yaml::from_str::<Vec<u32>>("a: [").unwrap_err();
        let err: PipelineError = yaml_err.into();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}

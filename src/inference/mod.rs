//! Inference boundary
//!
//! Loads a persisted model artifact with its train-fitted scaler and answers
//! single-row predictions. Every failure surfaces as
//! [`PipelineError::Inference`](crate::error::PipelineError::Inference).

mod predictor;

pub use predictor::{Prediction, Predictor};

//! Cross-validation splits
//!
//! Folds are contiguous and unshuffled: rows are time-ordered, and the
//! grid search must be reproducible from the seed and grid alone.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Contiguous K-Fold; the first `n % k` folds hold one extra row
    KFold { n_splits: usize },
}

/// A single train/validation split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
pub struct CrossValidator {
    strategy: CVStrategy,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self { strategy }
    }

    pub fn k_fold(n_splits: usize) -> Self {
        Self::new(CVStrategy::KFold { n_splits })
    }

    /// Generate train/validation splits for `n_samples` rows
    pub fn split(&self, n_samples: usize) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::KFold { n_splits } => k_fold_split(n_samples, *n_splits),
        }
    }
}

fn k_fold_split(n_samples: usize, n_splits: usize) -> Result<Vec<CVSplit>> {
    if n_splits < 2 {
        return Err(PipelineError::Training("n_splits must be at least 2".to_string()));
    }
    if n_samples < n_splits {
        return Err(PipelineError::Training(format!(
            "n_samples ({}) must be >= n_splits ({})",
            n_samples, n_splits
        )));
    }

    let base = n_samples / n_splits;
    let remainder = n_samples % n_splits;

    let mut splits = Vec::with_capacity(n_splits);
    let mut current = 0;

    for fold_idx in 0..n_splits {
        let fold_size = if fold_idx < remainder { base + 1 } else { base };
        let test_indices: Vec<usize> = (current..current + fold_size).collect();
        let train_indices: Vec<usize> = (0..current).chain(current + fold_size..n_samples).collect();

        splits.push(CVSplit {
            train_indices,
            test_indices,
            fold_idx,
        });

        current += fold_size;
    }

    Ok(splits)
}

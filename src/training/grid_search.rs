//! Exhaustive grid search with K-fold cross-validation
//!
//! Every (candidate, fold) pair is an independent task scheduled on a rayon
//! pool. Scores are reduced afterwards in candidate order, so the selected
//! candidate does not depend on the number of workers.

use crate::error::{PipelineError, Result};
use super::cross_validation::{CVSplit, CrossValidator};
use super::metrics::r2_score;
use super::params::{describe_candidate, Candidate, EstimatorKind, ForestParams, ParamGrid};
use super::random_forest::RandomForest;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Mean validation score of one candidate
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub index: usize,
    pub candidate: Candidate,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

/// Outcome of [`GridSearch::fit`]
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub best_index: usize,
    pub best_candidate: Candidate,
    pub best_params: ForestParams,
    pub best_score: f64,
    pub candidates: Vec<CandidateScore>,
    /// Best candidate refit on all rows
    pub best_model: RandomForest,
}

/// Grid search over forest hyperparameters, scored by mean R²
#[derive(Debug, Clone)]
pub struct GridSearch {
    estimator: EstimatorKind,
    grid: ParamGrid,
    cv_folds: usize,
    random_state: u64,
    n_jobs: Option<usize>,
}

impl GridSearch {
    pub fn new(estimator: EstimatorKind, grid: ParamGrid, cv_folds: usize) -> Self {
        Self {
            estimator,
            grid,
            cv_folds,
            random_state: 42,
            n_jobs: None,
        }
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Worker threads; `None` uses every core
    pub fn with_n_jobs(mut self, n_jobs: Option<usize>) -> Self {
        self.n_jobs = n_jobs;
        self
    }

    pub fn estimator(&self) -> EstimatorKind {
        self.estimator
    }

    /// Score every candidate and refit the best one on the full data.
    ///
    /// Ties keep the earliest candidate. Candidates whose mean score is NaN
    /// are never selected.
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<GridSearchResult> {
        if x.nrows() != y.len() {
            return Err(PipelineError::Shape {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }

        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            return Err(PipelineError::Training(
                "parameter grid produced no candidates".to_string(),
            ));
        }
        let params = candidates
            .iter()
            .map(ForestParams::from_candidate)
            .collect::<Result<Vec<_>>>()?;

        let splits = CrossValidator::k_fold(self.cv_folds).split(x.nrows())?;
        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..splits.len()).map(move |f| (c, f)))
            .collect();

        info!(
            estimator = %self.estimator,
            n_candidates = candidates.len(),
            n_folds = splits.len(),
            n_fits = tasks.len(),
            "Starting grid search"
        );
        let start = Instant::now();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_jobs.unwrap_or(0))
            .build()
            .map_err(|e| PipelineError::Training(format!("Thread pool error: {}", e)))?;

        let fold_scores: Vec<f64> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(c, f)| self.score_fold(&params[c], &splits[f], x, y))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut scored = Vec::with_capacity(candidates.len());
        let mut best: Option<(usize, f64)> = None;
        for (index, (candidate, scores)) in candidates
            .into_iter()
            .zip(fold_scores.chunks(splits.len()))
            .enumerate()
        {
            let mean_score = scores.iter().sum::<f64>() / scores.len() as f64;
            debug!(
                candidate = %describe_candidate(&candidate),
                mean_r2 = mean_score,
                "Candidate scored"
            );
            if mean_score.is_nan() {
                warn!(candidate = %describe_candidate(&candidate), "Candidate scored NaN, skipped");
            } else if best.map_or(true, |(_, best_score)| mean_score > best_score) {
                best = Some((index, mean_score));
            }
            scored.push(CandidateScore {
                index,
                candidate,
                fold_scores: scores.to_vec(),
                mean_score,
            });
        }

        let (best_index, best_score) = best.ok_or_else(|| {
            PipelineError::Training("no candidate produced a finite score".to_string())
        })?;
        let best_params = params[best_index].clone();
        let best_candidate = scored[best_index].candidate.clone();

        info!(
            best = %describe_candidate(&best_candidate),
            best_cv_r2 = best_score,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Grid search finished"
        );

        let mut best_model = best_params.build(self.random_state);
        pool.install(|| best_model.fit(x, y).map(|_| ()))?;

        Ok(GridSearchResult {
            best_index,
            best_candidate,
            best_params,
            best_score,
            candidates: scored,
            best_model,
        })
    }

    fn score_fold(
        &self,
        params: &ForestParams,
        split: &CVSplit,
        x: &Array2<f64>,
        y: &Array1<f64>,
    ) -> Result<f64> {
        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        let x_val = x.select(Axis(0), &split.test_indices);
        let y_val = y.select(Axis(0), &split.test_indices);

        let mut model = params.build(self.random_state);
        model.fit(&x_train, &y_train)?;
        let predictions = model.predict(&x_val)?;
        r2_score(&y_val, &predictions)
    }
}

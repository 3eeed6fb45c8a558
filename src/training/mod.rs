//! Model training
//!
//! Provides the regression forest and its model selection:
//! - CART regression trees and bagged random forests
//! - Hyperparameter grids and exhaustive grid search
//! - Contiguous K-fold cross-validation
//! - Regression scoring (R², RMSE, MAE)

pub mod cross_validation;
pub mod decision_tree;
pub mod grid_search;
pub mod metrics;
pub mod params;
pub mod random_forest;

pub use cross_validation::{CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{DecisionTree, TreeNode};
pub use grid_search::{CandidateScore, GridSearch, GridSearchResult};
pub use metrics::{mae, r2_score, rmse, RegressionMetrics};
pub use params::{
    describe_candidate, Candidate, EstimatorKind, ForestParams, ParamGrid, ParamValue,
};
pub use random_forest::{MaxFeatures, RandomForest};

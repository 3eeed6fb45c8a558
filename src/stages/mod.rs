//! Pipeline stages
//!
//! Each stage reads its input artifacts from disk and writes its outputs, so
//! any stage can be rerun on its own. [`run_all`] chains them in order.

pub mod evaluate;
pub mod featurize;
pub mod load;
pub mod split;
pub mod train;

pub use evaluate::{fit_then_score, MetricsReport, SplitScore};
pub use featurize::{engineer_features, FeaturizeReport, Features};
pub use load::{clean_raw_table, normalize_column_name, LoadReport};
pub use split::{partition_sizes, split_and_scale, Partitions};
pub use train::ModelArtifact;

use crate::config::PipelineConfig;
use crate::error::Result;
use std::time::Instant;
use tracing::info;

/// load -> featurize -> split -> train -> evaluate
pub fn run_all(config: &PipelineConfig) -> Result<MetricsReport> {
    let start = Instant::now();
    load::run(config)?;
    featurize::run(config)?;
    split::run(config)?;
    train::run(config)?;
    let report = evaluate::run(config)?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Pipeline finished");
    Ok(report)
}

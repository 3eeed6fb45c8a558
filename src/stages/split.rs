//! Order-preserving train/test partition and train-fitted scaling

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::preprocessing::MinMaxScaler;
use crate::utils::{DataLoader, DataSaver};
use polars::prelude::*;
use tracing::info;

/// Train/test partitions of X and y plus their scaled feature copies
#[derive(Debug, Clone)]
pub struct Partitions {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub x_train_scaled: DataFrame,
    pub x_test_scaled: DataFrame,
    pub y_train: DataFrame,
    pub y_test: DataFrame,
    pub scaler: MinMaxScaler,
}

/// Row counts of each side: `n_test = ceil(test_size * n)`
pub fn partition_sizes(n: usize, test_size: f64) -> Result<(usize, usize)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::Config(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(PipelineError::DataShape(format!(
            "{} rows cannot be split with test_size {} (train {}, test {})",
            n, test_size, n_train, n_test
        )));
    }
    Ok((n_train, n_test))
}

/// Contiguous split: the first rows train, the last rows test.
/// The scaler sees only the training rows.
pub fn split_and_scale(x: &DataFrame, y: &DataFrame, test_size: f64) -> Result<Partitions> {
    if x.height() != y.height() {
        return Err(PipelineError::DataShape(format!(
            "X has {} rows but y has {}",
            x.height(),
            y.height()
        )));
    }
    let (n_train, n_test) = partition_sizes(x.height(), test_size)?;

    let x_train = x.slice(0, n_train);
    let x_test = x.slice(n_train as i64, n_test);
    let y_train = y.slice(0, n_train);
    let y_test = y.slice(n_train as i64, n_test);

    let mut scaler = MinMaxScaler::new();
    let x_train_scaled = scaler.fit_transform(&x_train)?;
    let x_test_scaled = scaler.transform(&x_test)?;

    Ok(Partitions {
        x_train,
        x_test,
        x_train_scaled,
        x_test_scaled,
        y_train,
        y_test,
        scaler,
    })
}

/// Read X and y, partition and scale them, write the six tables
pub fn run(config: &PipelineConfig) -> Result<Partitions> {
    let fcfg = config.featurize()?;
    let cfg = config.data_split()?;

    let loader = DataLoader::new();
    let x = loader.load_csv(&fcfg.x_path)?;
    let y = loader.load_csv(&fcfg.y_path)?;

    let mut parts = split_and_scale(&x, &y, cfg.test_size)?;
    info!(
        rows = x.height(),
        train = parts.x_train.height(),
        test = parts.x_test.height(),
        test_size = cfg.test_size,
        "Data split"
    );

    DataSaver::save_csv(&mut parts.x_train, &cfg.x_train_path)?;
    DataSaver::save_csv(&mut parts.x_test, &cfg.x_test_path)?;
    DataSaver::save_csv(&mut parts.x_train_scaled, &cfg.x_train_scaled_path)?;
    DataSaver::save_csv(&mut parts.x_test_scaled, &cfg.x_test_scaled_path)?;
    DataSaver::save_csv(&mut parts.y_train, &cfg.y_train_path)?;
    DataSaver::save_csv(&mut parts.y_test, &cfg.y_test_path)?;

    if let Some(path) = &cfg.scaler_path {
        parts.scaler.save_json(path)?;
        info!(path = %path.display(), "Scaler parameters saved");
    }

    Ok(parts)
}

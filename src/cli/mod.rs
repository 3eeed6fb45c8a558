//! Command-line interface
//!
//! One subcommand per pipeline stage, plus `run` for the whole chain and
//! `predict` for a single row.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::inference::Predictor;
use crate::stages::{self, MetricsReport};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("  {} {}", ok("✓ done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "aqpipe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Config-driven air-quality regression pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean the raw export into the canonical table
    Load {
        /// Pipeline configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Impute, filter outliers, correct skew; write X and y
    Featurize {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Partition X and y and scale the features
    Split {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Grid search the estimator and save the best model
    Train {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Score the model on both partitions and write the metrics
    Evaluate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Run every stage in order
    Run {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Predict the target for one feature row
    Predict {
        #[arg(short, long)]
        config: PathBuf,

        /// JSON object with one value per feature column
        #[arg(short, long)]
        row: String,
    },
}

impl Commands {
    pub fn config_path(&self) -> &Path {
        match self {
            Commands::Load { config }
            | Commands::Featurize { config }
            | Commands::Split { config }
            | Commands::Train { config }
            | Commands::Evaluate { config }
            | Commands::Run { config }
            | Commands::Predict { config, .. } => config,
        }
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_load(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Load");
    step_run("Cleaning raw dataset");
    let start = Instant::now();
    let report = stages::load::run(config)?;
    step_done(&format!(
        "{} → {} rows, {} cols in {:?}",
        report.rows_read,
        report.rows_written,
        report.columns.len(),
        start.elapsed()
    ));
    Ok(())
}

pub fn cmd_featurize(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Featurize");
    step_run("Engineering features");
    let start = Instant::now();
    let report = stages::featurize::run(config)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!("  {}", kv("Rows", &format!("{} → {}", report.rows_in, report.rows_out)));
    println!("  {}", kv("Features", &report.feature_columns.len().to_string()));
    println!("  {}", kv("Target", &report.target_column));
    let transformed = report.transformed_columns();
    let transformed = if transformed.is_empty() {
        "none".to_string()
    } else {
        transformed.join(", ")
    };
    println!("  {}", kv("Box-Cox", &transformed));
    Ok(())
}

pub fn cmd_split(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Split");
    step_run("Partitioning and scaling");
    let start = Instant::now();
    let parts = stages::split::run(config)?;
    step_done(&format!(
        "train {} / test {} rows in {:?}",
        parts.x_train.height(),
        parts.x_test.height(),
        start.elapsed()
    ));
    Ok(())
}

pub fn cmd_train(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Train");
    step_run("Grid search");
    let start = Instant::now();
    let artifact = stages::train::run(config)?;
    step_done(&format!("{:?}", start.elapsed()));

    let best = artifact
        .candidate
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ");
    println!("  {}", kv("Estimator", &artifact.estimator.to_string().cyan().to_string()));
    println!("  {}", kv("Best", &best));
    println!("  {:<16} {}", muted("CV R²"), format!("{:.4}", artifact.cv_score).white().bold());
    Ok(())
}

fn print_metrics(report: &MetricsReport) {
    println!();
    println!("  {:<10}{:>10}{:>10}", muted("Metric"), muted("Train"), muted("Test"));
    for (name, score) in [("R2", report.r2), ("RMSE", report.rmse), ("MAE", report.mae)] {
        println!(
            "  {:<10}{:>10}{:>10}",
            name,
            format!("{:.4}", score.train).white().bold(),
            format!("{:.4}", score.test).white().bold()
        );
    }
    println!();
}

pub fn cmd_evaluate(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Evaluate");
    step_run("Refitting and scoring");
    let start = Instant::now();
    let report = stages::evaluate::run(config)?;
    step_done(&format!("{:?}", start.elapsed()));
    print_metrics(&report);
    Ok(())
}

pub fn cmd_run(config: &PipelineConfig) -> anyhow::Result<()> {
    let start = Instant::now();
    cmd_load(config)?;
    cmd_featurize(config)?;
    cmd_split(config)?;
    cmd_train(config)?;
    cmd_evaluate(config)?;
    println!("  {} {}", ok("✓"), dim(&format!("pipeline finished in {:?}", start.elapsed())));
    Ok(())
}

pub fn cmd_predict(config: &PipelineConfig, row: &str) -> anyhow::Result<()> {
    let predictor = Predictor::from_config(config)?;
    let prediction = predictor.predict_json(row)?;
    println!("{}", prediction.to_json());
    Ok(())
}

//! aqpipe - Main Entry Point

use aqpipe::cli::{
    cmd_evaluate, cmd_featurize, cmd_load, cmd_predict, cmd_run, cmd_split, cmd_train, Cli,
    Commands,
};
use aqpipe::config::PipelineConfig;
use clap::Parser;

/// Accept WARNING and CRITICAL alongside tracing level names
fn tracing_level(level: &str) -> String {
    match level.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        other => other.to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::from_file(cli.command.config_path())?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("aqpipe={}", tracing_level(&config.base.log_level)).into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Load { .. } => cmd_load(&config)?,
        Commands::Featurize { .. } => cmd_featurize(&config)?,
        Commands::Split { .. } => cmd_split(&config)?,
        Commands::Train { .. } => cmd_train(&config)?,
        Commands::Evaluate { .. } => cmd_evaluate(&config)?,
        Commands::Run { .. } => cmd_run(&config)?,
        Commands::Predict { row, .. } => cmd_predict(&config, row)?,
    }

    Ok(())
}

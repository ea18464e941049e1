//! EFO Pipeline - Main entry point

use clap::Parser;
use efo_common::logging::{init_logging, LogConfig};
use efo_pipeline::config::PipelineConfig;
use efo_pipeline::models::RunMode;
use efo_pipeline::pipeline::EfoPipeline;
use std::process;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "efo-pipeline", about = "EFO ontology data pipeline", version)]
struct Cli {
    /// Execution mode: test, full, or incremental
    #[arg(long, value_parser = parse_mode)]
    mode: Option<RunMode>,

    /// Record limit for test mode (0 disables the limit)
    #[arg(long)]
    limit: Option<usize>,
}

fn parse_mode(s: &str) -> Result<RunMode, String> {
    RunMode::from_str(&s.to_lowercase())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match PipelineConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };
    config.apply_overrides(cli.mode, cli.limit);

    let log_config = LogConfig {
        level: config.log_level,
        ..LogConfig::from_env().unwrap_or_default()
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    if let Err(e) = EfoPipeline::new(config).run().await {
        error!(error = %e, "Pipeline failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

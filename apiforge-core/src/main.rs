use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use apiforge::{Pipeline, StaticSuggestions};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about = "Resolve and validate application metadata")]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a metadata or Schema.org file without generating anything
    Validate { file: PathBuf },
    /// Run every stage and print what would be generated
    DryRun {
        file: PathBuf,
        /// JSON file of canned suggestions, keyed by entity name
        #[clap(long)]
        suggestions: Option<PathBuf>,
        /// TOML settings file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref());

    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<bool> {
    match command {
        Command::Validate { file } => {
            let report = Pipeline::default().check(&file).await;
            println!("{}", report.error_report());
            Ok(report.is_valid())
        }
        Command::DryRun {
            file,
            suggestions,
            config,
        } => {
            let mut pipeline = match &config {
                Some(path) => Pipeline::from_config_file(path)?,
                None => Pipeline::default(),
            };
            if let Some(path) = &suggestions {
                let service = StaticSuggestions::from_file(path)
                    .with_context(|| format!("loading suggestions from {}", path.display()))?;
                pipeline = pipeline.with_suggestions(Arc::new(service));
            }

            info!(file = %file.display(), "dry run");
            match pipeline.dry_run(&file).await {
                Ok(summary) => {
                    println!("{summary}");
                    Ok(true)
                }
                Err(e) => {
                    println!("❌ {} failed during {}:\n", file.display(), e.stage());
                    for (i, message) in e.diagnostics().iter().enumerate() {
                        println!("  {}. {}", i + 1, message);
                    }
                    Ok(false)
                }
            }
        }
    }
}

fn setup_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use budget_absorption::{
    ArtifactPaths, BudgetTable, InferenceRequest, InferenceService, TrainingConfig,
    TrainingPipeline,
};

#[derive(Parser)]
#[command(name = "budget-absorption")]
#[command(version)]
#[command(about = "Train and serve the budget absorption classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on a realization report and write the artifacts
    Train {
        /// Path to the realization CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for scaler.json and model.json
        #[arg(short, long, default_value = "artifacts")]
        out_dir: PathBuf,

        /// JSON training config (optional)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override both balancer and forest seeds
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Classify one budget line
    Predict {
        /// Directory holding the trained artifacts
        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,

        #[arg(long)]
        account: f64,

        #[arg(long)]
        original: f64,

        #[arg(long)]
        revised: f64,

        #[arg(long)]
        remaining: f64,

        /// Quarter, 1-4
        #[arg(long)]
        quarter: u8,
    },

    /// Score the trained artifacts against a labeled report
    Evaluate {
        /// Path to the realization CSV
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "artifacts")]
        artifacts: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only JSON results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            input,
            out_dir,
            config,
            seed,
        } => {
            let mut config = match config {
                Some(path) => TrainingConfig::from_json_path(&path)?,
                None => TrainingConfig::default(),
            };
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }

            let table = BudgetTable::from_csv_path(&input)?;
            info!(rows = table.len(), path = %input.display(), "loaded realization report");

            let artifacts = TrainingPipeline::new(config).fit_table(&table)?;
            artifacts.save(&ArtifactPaths::in_dir(&out_dir))?;

            println!("{}", serde_json::to_string_pretty(&artifacts.report)?);
        }

        Commands::Predict {
            artifacts,
            account,
            original,
            revised,
            remaining,
            quarter,
        } => {
            let service = InferenceService::load(&ArtifactPaths::in_dir(&artifacts))?;
            let prediction = service.predict_request(InferenceRequest {
                account_code: account,
                original_budget: original,
                revised_budget: revised,
                remaining_budget: remaining,
                quarter,
            })?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }

        Commands::Evaluate { input, artifacts } => {
            let service = InferenceService::load(&ArtifactPaths::in_dir(&artifacts))?;
            let cleaned = BudgetTable::from_csv_path(&input)?.clean();
            let report = service
                .evaluate(&cleaned.records)
                .with_context(|| format!("failed to evaluate {}", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

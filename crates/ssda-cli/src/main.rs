mod config;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipeline::{ManifestArgs, PlanArgs, PreviewArgs};

/// ssda: inspect SSDA datasets, preview training batches and write inference manifests.
#[derive(Parser)]
#[command(name = "ssda", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the domain index and print the iteration plan.
    Plan {
        /// Path to the ssda config TOML file.
        #[arg(long, default_value = "configs/ssda.toml")]
        config: PathBuf,
        /// Output as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
    /// Draw training batches through the masked-patch pretext chain and log statistics.
    Preview {
        /// Path to the ssda config TOML file.
        #[arg(long, default_value = "configs/ssda.toml")]
        config: PathBuf,
        /// Number of batches to draw (capped at the iteration plan).
        #[arg(long, default_value_t = 4)]
        batches: usize,
    },
    /// Run an inference pass over the test set and write a JSONL manifest.
    Manifest {
        /// Path to the ssda config TOML file.
        #[arg(long, default_value = "configs/ssda.toml")]
        config: PathBuf,
        /// Output JSONL file, one `{batch, row, path}` object per line.
        #[arg(long)]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Plan { config, json } => pipeline::run_plan(PlanArgs { config, json }),
        Command::Preview { config, batches } => {
            pipeline::run_preview(PreviewArgs { config, batches })
        }
        Command::Manifest { config, output } => {
            pipeline::run_manifest(ManifestArgs { config, output })
        }
    }
}

// src/cli/mod.rs — CLI definition (clap derive)

pub mod recover;
pub mod status;
pub mod train;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "playbook", about = "Heuristic-curation trainer for text classifiers", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a training run over a JSONL dataset and follow it to completion
    Train {
        /// Run name
        #[arg(long)]
        name: Option<String>,

        /// JSONL dataset: {"text", "category", "risk", "split"?} per line
        dataset: String,

        /// Max epochs before the run completes unconditionally
        #[arg(long)]
        max_epochs: Option<u32>,

        /// Epochs without improvement before the run plateaus
        #[arg(long)]
        patience: Option<u32>,

        /// Improvement threshold reported in plateau messages
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Seed baseline playbook heuristics from a JSONL file
    Seed {
        /// JSONL playbook: {"section", "content"} per line
        playbook: String,
    },
    /// Show one run's status, metrics, and plateau verdict
    Status {
        run_id: String,
        /// Also list curated heuristics with effectiveness counters
        #[arg(long)]
        verbose: bool,
    },
    /// List all runs
    Runs,
    /// Request a cooperative stop (takes effect at the next epoch boundary)
    Stop { run_id: String },
    /// Scan for orphaned runs and fail them safely
    Recover,
}

// src/main.rs — playbook entry point

use clap::Parser;

use playbook::cli::{recover, status, train, Cli, Commands};
use playbook::infra::config::Config;
use playbook::infra::{logger, paths};
use playbook::store;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG
    logger::init_logging("warn");

    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    let shared = store::shared(store::open(&paths::db_path())?);

    match cli.command {
        Commands::Train {
            name,
            dataset,
            max_epochs,
            patience,
            threshold,
        } => {
            train::run_train(
                shared,
                &config,
                name.as_deref(),
                &dataset,
                max_epochs,
                patience,
                threshold,
            )
            .await
        }
        Commands::Seed { playbook } => train::run_seed(shared, &playbook),
        Commands::Status { run_id, verbose } => status::show_status(shared, &run_id, verbose),
        Commands::Runs => status::list_runs(shared),
        Commands::Stop { run_id } => train::run_stop(shared, &run_id),
        Commands::Recover => recover::run_recover(shared, &config),
    }
}

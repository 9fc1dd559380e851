// src/cli/train.rs — Start a run from a JSONL dataset

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::agents::{AgentStep, LlmAgent};
use crate::core::controller::RunController;
use crate::core::types::{HeuristicEntry, RiskLevel, SampleSplit, TrainingSample};
use crate::infra::config::Config;
use crate::provider::anthropic::AnthropicProvider;
use crate::store::{self, SharedStore};

/// One dataset line. `split` defaults to eval: the loop trains the
/// playbook, not weights, so most datasets are all-eval.
#[derive(Debug, Deserialize)]
struct DatasetRecord {
    text: String,
    category: String,
    risk: String,
    #[serde(default)]
    split: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaybookRecord {
    section: String,
    content: String,
}

pub async fn run_train(
    store: SharedStore,
    config: &Config,
    name: Option<&str>,
    dataset_path: &str,
    max_epochs: Option<u32>,
    patience: Option<u32>,
    threshold: Option<f64>,
) -> anyhow::Result<()> {
    let provider = Arc::new(AnthropicProvider::from_env()?);
    let agent: Arc<dyn AgentStep> = Arc::new(LlmAgent::new(provider, &config.models));
    let controller = RunController::new(store.clone(), agent);

    let default_name = Path::new(dataset_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("training-run");
    let run = controller.create_run(
        name.unwrap_or(default_name),
        max_epochs.unwrap_or(config.training.max_epochs),
        threshold.unwrap_or(config.training.plateau_threshold),
        patience.unwrap_or(config.training.plateau_patience),
    )?;

    let ingested = ingest_dataset(&store, &run.id, dataset_path)?;
    println!("run {} created ({} samples ingested)", run.id, ingested);

    // The library API is fire-and-continue; the CLI process has nothing
    // else to do, so it follows the spawned loop to its terminal state.
    let handle = controller.spawn(run.id.clone());
    handle.await?;

    let snapshot = controller.snapshot(&run.id)?;
    println!(
        "run {} {} after {} epoch(s)",
        run.id, snapshot.run.status, snapshot.epochs_completed
    );
    if let Some(best) = &snapshot.best {
        println!(
            "best epoch {}: overall F1 {:.4}, accuracy {:.4}",
            best.epoch_number, best.overall_f1, best.accuracy
        );
    }
    if let Some(reason) = &snapshot.run.failure_reason {
        println!("failure reason: {reason}");
    }
    Ok(())
}

pub fn run_seed(store: SharedStore, playbook_path: &str) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(playbook_path)?;
    let store_guard = store::lock(&store)?;

    let mut seeded = 0usize;
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: PlaybookRecord = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("{playbook_path}:{}: {e}", line_no + 1))?;
        store_guard.insert_heuristic(&HeuristicEntry::baseline(record.section, record.content))?;
        seeded += 1;
    }

    println!("seeded {seeded} baseline heuristic(s)");
    Ok(())
}

pub fn run_stop(store: SharedStore, run_id: &str) -> anyhow::Result<()> {
    store::lock(&store)?
        .request_stop(run_id)?
        .then_some(())
        .ok_or_else(|| anyhow::anyhow!("run '{run_id}' not found"))?;
    println!("stop requested for {run_id}; takes effect at the next epoch boundary");
    Ok(())
}

fn ingest_dataset(store: &SharedStore, run_id: &str, path: &str) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    let store_guard = store::lock(store)?;

    let mut ingested = 0usize;
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: DatasetRecord = serde_json::from_str(line)
            .map_err(|e| anyhow::anyhow!("{path}:{}: {e}", line_no + 1))?;

        let risk = RiskLevel::parse(&record.risk)
            .ok_or_else(|| anyhow::anyhow!("{path}:{}: unknown risk '{}'", line_no + 1, record.risk))?;
        let split = match record.split.as_deref() {
            None => SampleSplit::Eval,
            Some(s) => SampleSplit::parse(s)
                .ok_or_else(|| anyhow::anyhow!("{path}:{}: unknown split '{s}'", line_no + 1))?,
        };

        store_guard.insert_sample(&TrainingSample::new(
            run_id,
            split,
            record.text,
            record.category,
            risk,
        ))?;
        ingested += 1;
    }

    Ok(ingested)
}

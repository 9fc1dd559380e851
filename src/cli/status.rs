// src/cli/status.rs — Run status and listings

use crate::store::{self, SharedStore};

pub fn show_status(store: SharedStore, run_id: &str, verbose: bool) -> anyhow::Result<()> {
    let store_guard = store::lock(&store)?;
    let run = store_guard
        .get_run(run_id)?
        .ok_or_else(|| anyhow::anyhow!("run '{run_id}' not found"))?;
    let results = store_guard.list_epoch_results(run_id)?;

    println!("run:        {} ({})", run.id, run.name);
    println!("status:     {}", run.status);
    println!(
        "progress:   {}/{} epoch(s)",
        results.len(),
        run.max_epochs
    );
    if let Some(reason) = &run.failure_reason {
        println!("failed:     {reason}");
    }
    if let Some(started) = run.started_at {
        println!("started:    {}", started.to_rfc3339());
    }
    if let Some(completed) = run.completed_at {
        println!("finished:   {}", completed.to_rfc3339());
    }

    if !results.is_empty() {
        println!();
        println!("epoch  overall_f1  accuracy  playbook  errors  added");
        for r in &results {
            println!(
                "{:>5}  {:>10.4}  {:>8.4}  {:>8}  {:>6}  {:>5}",
                r.epoch_number,
                r.overall_f1,
                r.accuracy,
                r.playbook_size,
                r.errors_found,
                r.heuristics_added
            );
        }
    }

    if verbose {
        let playbook = store_guard.playbook_at_epoch(run_id, u32::MAX)?;
        if !playbook.is_empty() {
            println!();
            println!("playbook ({} rule(s)):", playbook.len());
            for h in &playbook {
                let origin = match h.epoch_number {
                    Some(epoch) => format!("epoch {epoch}"),
                    None => "baseline".to_string(),
                };
                println!(
                    "  [{}] ({}, {}) +{}/-{} {}",
                    h.id, h.section, origin, h.helpful_count, h.harmful_count, h.content
                );
            }
        }
    }

    Ok(())
}

pub fn list_runs(store: SharedStore) -> anyhow::Result<()> {
    let store_guard = store::lock(&store)?;
    let runs = store_guard.list_runs()?;
    if runs.is_empty() {
        println!("no runs yet");
        return Ok(());
    }

    for run in &runs {
        let epochs = store_guard.list_epoch_results(&run.id)?.len();
        println!(
            "{}  {:<9}  {:>2} epoch(s)  {}",
            run.id,
            run.status.as_str(),
            epochs,
            run.name
        );
    }
    Ok(())
}

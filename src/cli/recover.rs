// src/cli/recover.rs — Manual "recover now" trigger

use crate::infra::config::Config;
use crate::recovery::RecoverySupervisor;
use crate::store::SharedStore;

pub fn run_recover(store: SharedStore, config: &Config) -> anyhow::Result<()> {
    let supervisor = RecoverySupervisor::new(store, &config.recovery);
    let report = supervisor.recover();

    println!(
        "recovered {} run(s): {} stale, {} timed out",
        report.total(),
        report.stale_runs_failed,
        report.timed_out_runs_failed
    );
    Ok(())
}

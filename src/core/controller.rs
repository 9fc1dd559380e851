// src/core/controller.rs — Run state machine and epoch loop
//
// States: pending → running → {completed, failed, stopped}. Running is
// the only non-terminal state after start. The stop flag is persisted
// state checked at exactly one suspension point, the epoch boundary,
// and takes priority over the algorithmic continuation decision.

use std::sync::Arc;

use tracing::{error, info};

use crate::agents::AgentStep;
use crate::core::epoch::EpochPipeline;
use crate::core::plateau::{self, EpochPoint, PlateauConfig, PlateauVerdict};
use crate::core::types::{EpochResult, RunStatus, TrainingRun};
use crate::infra::errors::TrainerError;
use crate::store::{self, SharedStore};

#[derive(Clone)]
pub struct RunController {
    store: SharedStore,
    agent: Arc<dyn AgentStep>,
}

/// Status surface for external callers: where the run is, how far it
/// got, and what the plateau detector currently thinks.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    pub run: TrainingRun,
    pub epochs_completed: u32,
    pub latest: Option<EpochResult>,
    pub best: Option<EpochResult>,
    pub verdict: Option<PlateauVerdict>,
}

impl RunController {
    pub fn new(store: SharedStore, agent: Arc<dyn AgentStep>) -> Self {
        Self { store, agent }
    }

    /// Insert a pending run. Nothing happens until `spawn` or `drive`.
    pub fn create_run(
        &self,
        name: &str,
        max_epochs: u32,
        plateau_threshold: f64,
        plateau_patience: u32,
    ) -> anyhow::Result<TrainingRun> {
        let run = TrainingRun::new(name, max_epochs, plateau_threshold, plateau_patience);
        store::lock(&self.store)?.insert_run(&run)?;
        Ok(run)
    }

    /// Fire-and-continue: start the epoch loop on a background task and
    /// return immediately. A terminal error inside the task marks the
    /// run failed so it cannot linger as running.
    pub fn spawn(&self, run_id: String) -> tokio::task::JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            match controller.drive(&run_id).await {
                Ok(status) => info!(run = %run_id, %status, "run finished"),
                Err(e) => {
                    error!(run = %run_id, "run loop error: {e:#}");
                    if let Ok(s) = store::lock(&controller.store) {
                        let _ = s.fail_run_if_running(&run_id, &format!("{e:#}"));
                    }
                }
            }
        })
    }

    /// Drive the epoch loop to a terminal state. Refuses anything but a
    /// pending run, so there is one active pipeline per run id.
    pub async fn drive(&self, run_id: &str) -> anyhow::Result<RunStatus> {
        let run = self.load_run(run_id)?;
        {
            let s = store::lock(&self.store)?;
            if !s.mark_run_running(run_id)? {
                return Err(TrainerError::InvalidRunState {
                    id: run_id.to_string(),
                    status: run.status.to_string(),
                    expected: RunStatus::Pending.to_string(),
                }
                .into());
            }
        }
        info!(run = %run_id, max_epochs = run.max_epochs, "run started");

        let pipeline = EpochPipeline::new(self.store.clone(), self.agent.clone());
        let config = PlateauConfig {
            threshold: run.plateau_threshold,
            patience: run.plateau_patience,
        };

        let mut epoch_number = 0u32;
        loop {
            epoch_number += 1;

            if let Err(e) = pipeline.run_epoch(&run, epoch_number).await {
                let reason = format!("epoch {} failed: {:#}", epoch_number, e);
                error!(run = %run_id, "{reason}");
                store::lock(&self.store)?.fail_run(run_id, &reason)?;
                return Ok(RunStatus::Failed);
            }

            // Epoch boundary: the user's stop request wins over any
            // algorithmic continuation decision.
            let current = self.load_run(run_id)?;
            if current.stop_requested {
                info!(run = %run_id, epoch = epoch_number, "stop requested, run stopping");
                store::lock(&self.store)?.finish_run(run_id, RunStatus::Stopped)?;
                return Ok(RunStatus::Stopped);
            }

            let points = self.epoch_points(run_id)?;
            if !plateau::should_continue(&points, run.max_epochs, &config) {
                if let Some(verdict) = plateau::detect(&points, &config) {
                    info!(run = %run_id, "{}", verdict.message);
                }
                store::lock(&self.store)?.finish_run(run_id, RunStatus::Completed)?;
                return Ok(RunStatus::Completed);
            }
        }
    }

    /// Request a cooperative stop, observed at the next epoch boundary.
    pub fn request_stop(&self, run_id: &str) -> anyhow::Result<()> {
        let found = store::lock(&self.store)?.request_stop(run_id)?;
        if !found {
            return Err(TrainerError::RunNotFound(run_id.to_string()).into());
        }
        Ok(())
    }

    pub fn snapshot(&self, run_id: &str) -> anyhow::Result<RunSnapshot> {
        let run = self.load_run(run_id)?;
        let results = store::lock(&self.store)?.list_epoch_results(run_id)?;

        let config = PlateauConfig {
            threshold: run.plateau_threshold,
            patience: run.plateau_patience,
        };
        let points: Vec<EpochPoint> = results
            .iter()
            .map(|r| EpochPoint {
                epoch_number: r.epoch_number,
                overall_f1: r.overall_f1,
            })
            .collect();
        let verdict = plateau::detect(&points, &config);

        let best = verdict.as_ref().and_then(|v| {
            results
                .iter()
                .find(|r| r.epoch_number == v.best_epoch)
                .cloned()
        });

        Ok(RunSnapshot {
            epochs_completed: results.len() as u32,
            latest: results.last().cloned(),
            best,
            verdict,
            run,
        })
    }

    fn load_run(&self, run_id: &str) -> anyhow::Result<TrainingRun> {
        store::lock(&self.store)?
            .get_run(run_id)?
            .ok_or_else(|| TrainerError::RunNotFound(run_id.to_string()).into())
    }

    fn epoch_points(&self, run_id: &str) -> anyhow::Result<Vec<EpochPoint>> {
        let results = store::lock(&self.store)?.list_epoch_results(run_id)?;
        Ok(results
            .iter()
            .map(|r| EpochPoint {
                epoch_number: r.epoch_number,
                overall_f1: r.overall_f1,
            })
            .collect())
    }
}

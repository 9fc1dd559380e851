// src/core/epoch.rs — One Generate → Evaluate → Reflect → Curate pass
//
// Per-item agent failures are skipped; the epoch continues. Only an
// empty eval split or an error escaping the per-item boundaries aborts
// the epoch (and with it, the run).

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::agents::{AgentStep, ErrorCase, ReflectionDraft};
use crate::core::tracker::EffectivenessTracker;
use crate::core::types::{
    AgentLog, AgentType, EpochResult, HeuristicEntry, Reflection, SampleSplit, TrainingRun,
};
use crate::evaluator::{evaluate, ScoredSample};
use crate::infra::errors::TrainerError;
use crate::store::{self, SharedStore};

pub struct EpochPipeline {
    store: SharedStore,
    agent: Arc<dyn AgentStep>,
}

/// What one epoch produced, for the controller's logging.
#[derive(Debug, Clone)]
pub struct EpochOutcome {
    pub result: EpochResult,
    pub scored: usize,
    pub skipped: usize,
}

impl EpochPipeline {
    pub fn new(store: SharedStore, agent: Arc<dyn AgentStep>) -> Self {
        Self { store, agent }
    }

    pub async fn run_epoch(
        &self,
        run: &TrainingRun,
        epoch_number: u32,
    ) -> anyhow::Result<EpochOutcome> {
        let (samples, playbook) = {
            let s = store::lock(&self.store)?;
            (
                s.list_samples(&run.id, SampleSplit::Eval)?,
                s.playbook_at_epoch(&run.id, epoch_number)?,
            )
        };

        if samples.is_empty() {
            return Err(TrainerError::EmptyEvalSplit(run.id.clone()).into());
        }

        info!(
            run = %run.id,
            epoch = epoch_number,
            samples = samples.len(),
            playbook = playbook.len(),
            "epoch started"
        );

        // 1. Generate + 2. Score. Items are issued one at a time; a failed
        // or unparseable call drops the sample from the epoch entirely.
        let mut scored: Vec<ScoredSample> = Vec::with_capacity(samples.len());
        let mut skipped = 0usize;
        for sample in &samples {
            match self.agent.classify(&sample.text, &playbook).await {
                Ok(classification) => scored.push(ScoredSample {
                    sample_id: sample.id.clone(),
                    text: sample.text.clone(),
                    true_category: sample.true_category.clone(),
                    true_risk: sample.true_risk,
                    predicted_category: classification.category,
                    predicted_risk: classification.risk,
                    cited_heuristic_ids: classification.cited_heuristic_ids,
                }),
                Err(failure) => {
                    debug!(run = %run.id, epoch = epoch_number, %failure, "sample skipped");
                    skipped += 1;
                }
            }
        }

        // 3. Track citation effectiveness, flushed as atomic deltas.
        let mut tracker = EffectivenessTracker::new();
        for s in &scored {
            tracker.record(&s.cited_heuristic_ids, s.is_correct());
        }

        {
            let store_guard = store::lock(&self.store)?;
            tracker.flush(&store_guard)?;
            store_guard.insert_agent_log(&AgentLog::new(
                &run.id,
                epoch_number,
                AgentType::Generator,
                format!(
                    "classified {}/{} eval samples ({} skipped)",
                    scored.len(),
                    samples.len(),
                    skipped
                ),
                serde_json::json!({
                    "scored": scored.len(),
                    "skipped": skipped,
                    "playbook_size": playbook.len(),
                }),
            ))?;
            store_guard.touch_run_activity(&run.id)?;
        }

        // 4. Evaluate and persist the epoch record right away;
        // heuristics_added is backfilled after curation.
        let report = evaluate(&scored);
        let errors: Vec<&ScoredSample> = scored.iter().filter(|s| !s.is_correct()).collect();

        let result = EpochResult {
            run_id: run.id.clone(),
            epoch_number,
            category_f1: report.category_f1,
            risk_f1: report.risk_f1,
            overall_f1: report.overall_f1,
            accuracy: report.accuracy,
            playbook_size: playbook.len() as u32,
            errors_found: errors.len() as u32,
            heuristics_added: 0,
            created_at: Utc::now(),
        };
        store::lock(&self.store)?.insert_epoch_result(&result)?;

        // 5. Reflect on every error; per-error failures are skipped.
        let mut reflections: Vec<ReflectionDraft> = Vec::new();
        let mut reflect_skipped = 0usize;
        for error in &errors {
            let case = ErrorCase {
                text: error.text.clone(),
                predicted_category: error.predicted_category.clone(),
                predicted_risk: error.predicted_risk,
                true_category: error.true_category.clone(),
                true_risk: error.true_risk,
            };
            match self.agent.reflect(&case).await {
                Ok(draft) => {
                    let reflection = Reflection {
                        id: uuid::Uuid::new_v4().to_string(),
                        run_id: run.id.clone(),
                        epoch_number,
                        error_type: draft.error_type.clone(),
                        correct_approach: draft.correct_approach.clone(),
                        key_insight: draft.key_insight.clone(),
                        affected_section: draft.affected_section.clone(),
                        tag: draft.tag.clone(),
                        input_text: error.text.clone(),
                        predicted_category: error.predicted_category.clone(),
                        predicted_risk: error.predicted_risk,
                        expected_category: error.true_category.clone(),
                        expected_risk: error.true_risk,
                        created_at: Utc::now(),
                    };
                    store::lock(&self.store)?.insert_reflection(&reflection)?;
                    reflections.push(draft);
                }
                Err(failure) => {
                    warn!(run = %run.id, epoch = epoch_number, %failure, "reflection skipped");
                    reflect_skipped += 1;
                }
            }
        }

        {
            let store_guard = store::lock(&self.store)?;
            store_guard.insert_agent_log(&AgentLog::new(
                &run.id,
                epoch_number,
                AgentType::Reflector,
                format!(
                    "analyzed {}/{} errors ({} skipped)",
                    reflections.len(),
                    errors.len(),
                    reflect_skipped
                ),
                serde_json::json!({
                    "errors": errors.len(),
                    "reflections": reflections.len(),
                    "skipped": reflect_skipped,
                }),
            ))?;
            store_guard.touch_run_activity(&run.id)?;
        }

        // 6. Curate. The sequence index is shared across every reflection
        // processed this epoch, and zero accepted bullets is not an error.
        let mut seq = 0u32;
        let mut added = 0u32;
        let mut curate_skipped = 0usize;
        for draft in &reflections {
            match self.agent.curate(draft, &playbook).await {
                Ok(bullets) => {
                    for bullet in bullets {
                        let entry = HeuristicEntry {
                            id: format!("{}-e{}-h{}", run.id, epoch_number, seq),
                            section: bullet.section,
                            content: bullet.content,
                            helpful_count: 0,
                            harmful_count: 0,
                            run_id: Some(run.id.clone()),
                            epoch_number: Some(epoch_number),
                            last_updated: Utc::now(),
                        };
                        store::lock(&self.store)?.insert_heuristic(&entry)?;
                        seq += 1;
                        added += 1;
                    }
                }
                Err(failure) => {
                    warn!(run = %run.id, epoch = epoch_number, %failure, "curation skipped");
                    curate_skipped += 1;
                }
            }
        }

        // 7. Backfill the epoch record with what curation persisted.
        {
            let store_guard = store::lock(&self.store)?;
            store_guard.set_epoch_heuristics_added(&run.id, epoch_number, added)?;
            store_guard.insert_agent_log(&AgentLog::new(
                &run.id,
                epoch_number,
                AgentType::Curator,
                format!(
                    "accepted {} heuristic(s) from {} reflection(s) ({} skipped)",
                    added,
                    reflections.len(),
                    curate_skipped
                ),
                serde_json::json!({
                    "reflections": reflections.len(),
                    "accepted": added,
                    "skipped": curate_skipped,
                }),
            ))?;
            store_guard.touch_run_activity(&run.id)?;
        }

        info!(
            run = %run.id,
            epoch = epoch_number,
            overall_f1 = result.overall_f1,
            accuracy = result.accuracy,
            errors = result.errors_found,
            heuristics_added = added,
            "epoch finished"
        );

        Ok(EpochOutcome {
            result: EpochResult {
                heuristics_added: added,
                ..result
            },
            scored: scored.len(),
            skipped,
        })
    }
}

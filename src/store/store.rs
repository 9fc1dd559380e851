// src/store/store.rs — SQLite operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::types::{
    AgentLog, AgentType, EpochResult, HeuristicEntry, Reflection, RiskLevel, RunStatus,
    SampleSplit, TrainingRun, TrainingSample,
};

/// Low-level SQLite operations for all six entities.
pub struct Store {
    conn: Connection,
}

fn parse_ts(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<TrainingRun> {
    let status_raw: String = row.get(5)?;
    let stop_requested: i64 = row.get(6)?;
    Ok(TrainingRun {
        id: row.get(0)?,
        name: row.get(1)?,
        max_epochs: row.get(2)?,
        plateau_threshold: row.get(3)?,
        plateau_patience: row.get(4)?,
        status: RunStatus::parse(&status_raw).unwrap_or(RunStatus::Failed),
        stop_requested: stop_requested != 0,
        failure_reason: row.get(7)?,
        started_at: parse_ts(row.get(8)?),
        completed_at: parse_ts(row.get(9)?),
        last_activity_at: parse_ts(row.get(10)?),
        created_at: parse_ts(row.get(11)?).unwrap_or_else(Utc::now),
    })
}

const RUN_COLUMNS: &str = "id, name, max_epochs, plateau_threshold, plateau_patience, status, \
     stop_requested, failure_reason, started_at, completed_at, last_activity_at, created_at";

impl Store {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    // -- Training runs --

    pub fn insert_run(&self, run: &TrainingRun) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO training_runs (id, name, max_epochs, plateau_threshold, plateau_patience,
             status, stop_requested, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run.id,
                run.name,
                run.max_epochs,
                run.plateau_threshold,
                run.plateau_patience,
                run.status.as_str(),
                run.stop_requested as i64,
                run.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_run(&self, id: &str) -> anyhow::Result<Option<TrainingRun>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM training_runs WHERE id = ?1"),
                params![id],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    pub fn list_runs(&self) -> anyhow::Result<Vec<TrainingRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM training_runs ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], run_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn list_running_runs(&self) -> anyhow::Result<Vec<TrainingRun>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM training_runs WHERE status = 'running'"
        ))?;
        let rows = stmt.query_map([], run_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// pending → running. Returns false if the run was not pending.
    pub fn mark_run_running(&self, id: &str) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let affected = self.conn.execute(
            "UPDATE training_runs SET status = 'running', started_at = ?1, last_activity_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![now, id],
        )?;
        Ok(affected == 1)
    }

    /// Heartbeat for the stale scan.
    pub fn touch_run_activity(&self, id: &str) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE training_runs SET last_activity_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(())
    }

    /// Terminal transition to completed or stopped.
    pub fn finish_run(&self, id: &str, status: RunStatus) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE training_runs SET status = ?1, completed_at = ?2, last_activity_at = ?2
             WHERE id = ?3",
            params![status.as_str(), now, id],
        )?;
        Ok(())
    }

    /// Terminal transition to failed, with a human-readable reason.
    pub fn fail_run(&self, id: &str, reason: &str) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE training_runs SET status = 'failed', failure_reason = ?1, completed_at = ?2
             WHERE id = ?3",
            params![reason, now, id],
        )?;
        Ok(())
    }

    /// Conditional failure used by the recovery supervisor: only flips a
    /// run that is still running, so a scan racing a finishing controller
    /// (or another scan) fails a run at most once.
    pub fn fail_run_if_running(&self, id: &str, reason: &str) -> anyhow::Result<bool> {
        let now = Utc::now().to_rfc3339();
        let affected = self.conn.execute(
            "UPDATE training_runs SET status = 'failed', failure_reason = ?1, completed_at = ?2
             WHERE id = ?3 AND status = 'running'",
            params![reason, now, id],
        )?;
        Ok(affected == 1)
    }

    /// Cooperative stop: flag is observed at the next epoch boundary.
    pub fn request_stop(&self, id: &str) -> anyhow::Result<bool> {
        let affected = self.conn.execute(
            "UPDATE training_runs SET stop_requested = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(affected == 1)
    }

    // -- Epoch results --

    pub fn insert_epoch_result(&self, result: &EpochResult) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO epoch_results (run_id, epoch_number, category_f1, risk_f1, overall_f1,
             accuracy, playbook_size, errors_found, heuristics_added, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                result.run_id,
                result.epoch_number,
                result.category_f1,
                result.risk_f1,
                result.overall_f1,
                result.accuracy,
                result.playbook_size,
                result.errors_found,
                result.heuristics_added,
                result.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Backfill after curation has run.
    pub fn set_epoch_heuristics_added(
        &self,
        run_id: &str,
        epoch_number: u32,
        heuristics_added: u32,
    ) -> anyhow::Result<()> {
        self.conn.execute(
            "UPDATE epoch_results SET heuristics_added = ?1
             WHERE run_id = ?2 AND epoch_number = ?3",
            params![heuristics_added, run_id, epoch_number],
        )?;
        Ok(())
    }

    pub fn list_epoch_results(&self, run_id: &str) -> anyhow::Result<Vec<EpochResult>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, epoch_number, category_f1, risk_f1, overall_f1, accuracy,
             playbook_size, errors_found, heuristics_added, created_at
             FROM epoch_results WHERE run_id = ?1 ORDER BY epoch_number ASC",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            let created_raw: String = row.get(9)?;
            Ok(EpochResult {
                run_id: row.get(0)?,
                epoch_number: row.get(1)?,
                category_f1: row.get(2)?,
                risk_f1: row.get(3)?,
                overall_f1: row.get(4)?,
                accuracy: row.get(5)?,
                playbook_size: row.get(6)?,
                errors_found: row.get(7)?,
                heuristics_added: row.get(8)?,
                created_at: parse_ts(Some(created_raw)).unwrap_or_else(Utc::now),
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Training samples --

    pub fn insert_sample(&self, sample: &TrainingSample) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO training_samples (id, run_id, split, text, true_category, true_risk, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sample.id,
                sample.run_id,
                sample.split.as_str(),
                sample.text,
                sample.true_category,
                sample.true_risk.as_str(),
                now,
            ],
        )?;
        Ok(())
    }

    pub fn list_samples(
        &self,
        run_id: &str,
        split: SampleSplit,
    ) -> anyhow::Result<Vec<TrainingSample>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, split, text, true_category, true_risk
             FROM training_samples WHERE run_id = ?1 AND split = ?2
             ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![run_id, split.as_str()], |row| {
            let split_raw: String = row.get(2)?;
            let risk_raw: String = row.get(5)?;
            Ok(TrainingSample {
                id: row.get(0)?,
                run_id: row.get(1)?,
                split: SampleSplit::parse(&split_raw).unwrap_or(SampleSplit::Eval),
                text: row.get(3)?,
                true_category: row.get(4)?,
                true_risk: RiskLevel::parse(&risk_raw).unwrap_or(RiskLevel::Medium),
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Heuristic entries --

    pub fn insert_heuristic(&self, entry: &HeuristicEntry) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO heuristic_entries (id, section, content, helpful_count, harmful_count,
             run_id, epoch_number, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                entry.section,
                entry.content,
                entry.helpful_count,
                entry.harmful_count,
                entry.run_id,
                entry.epoch_number,
                entry.last_updated.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_heuristic(&self, id: &str) -> anyhow::Result<Option<HeuristicEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, section, content, helpful_count, harmful_count, run_id, epoch_number,
                 last_updated
                 FROM heuristic_entries WHERE id = ?1",
                params![id],
                heuristic_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// The playbook visible at the start of the given epoch: baseline
    /// entries plus this run's entries curated in earlier epochs.
    pub fn playbook_at_epoch(
        &self,
        run_id: &str,
        epoch_number: u32,
    ) -> anyhow::Result<Vec<HeuristicEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, section, content, helpful_count, harmful_count, run_id, epoch_number,
             last_updated
             FROM heuristic_entries
             WHERE run_id IS NULL OR (run_id = ?1 AND epoch_number < ?2)
             ORDER BY epoch_number ASC NULLS FIRST, rowid ASC",
        )?;

        let rows = stmt.query_map(params![run_id, epoch_number], heuristic_from_row)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Atomic add-delta counter update; never read-modify-write.
    pub fn increment_heuristic_counters(
        &self,
        id: &str,
        helpful_delta: i64,
        harmful_delta: i64,
    ) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "UPDATE heuristic_entries SET helpful_count = helpful_count + ?1,
             harmful_count = harmful_count + ?2, last_updated = ?3
             WHERE id = ?4",
            params![helpful_delta, harmful_delta, now, id],
        )?;
        Ok(())
    }

    // -- Reflections --

    pub fn insert_reflection(&self, reflection: &Reflection) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO reflections (id, run_id, epoch_number, error_type, correct_approach,
             key_insight, affected_section, tag, input_text, predicted_category, predicted_risk,
             expected_category, expected_risk, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                reflection.id,
                reflection.run_id,
                reflection.epoch_number,
                reflection.error_type,
                reflection.correct_approach,
                reflection.key_insight,
                reflection.affected_section,
                reflection.tag,
                reflection.input_text,
                reflection.predicted_category,
                reflection.predicted_risk.as_str(),
                reflection.expected_category,
                reflection.expected_risk.as_str(),
                reflection.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_reflections(
        &self,
        run_id: &str,
        epoch_number: u32,
    ) -> anyhow::Result<Vec<Reflection>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, epoch_number, error_type, correct_approach, key_insight,
             affected_section, tag, input_text, predicted_category, predicted_risk,
             expected_category, expected_risk, created_at
             FROM reflections WHERE run_id = ?1 AND epoch_number = ?2
             ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![run_id, epoch_number], |row| {
            let predicted_risk_raw: String = row.get(10)?;
            let expected_risk_raw: String = row.get(12)?;
            let created_raw: String = row.get(13)?;
            Ok(Reflection {
                id: row.get(0)?,
                run_id: row.get(1)?,
                epoch_number: row.get(2)?,
                error_type: row.get(3)?,
                correct_approach: row.get(4)?,
                key_insight: row.get(5)?,
                affected_section: row.get(6)?,
                tag: row.get(7)?,
                input_text: row.get(8)?,
                predicted_category: row.get(9)?,
                predicted_risk: RiskLevel::parse(&predicted_risk_raw).unwrap_or(RiskLevel::Medium),
                expected_category: row.get(11)?,
                expected_risk: RiskLevel::parse(&expected_risk_raw).unwrap_or(RiskLevel::Medium),
                created_at: parse_ts(Some(created_raw)).unwrap_or_else(Utc::now),
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    // -- Agent logs --

    pub fn insert_agent_log(&self, log: &AgentLog) -> anyhow::Result<()> {
        self.conn.execute(
            "INSERT INTO agent_logs (id, run_id, epoch_number, agent_type, summary, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                log.id,
                log.run_id,
                log.epoch_number,
                log.agent_type.as_str(),
                log.summary,
                serde_json::to_string(&log.payload)?,
                log.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn list_agent_logs(&self, run_id: &str) -> anyhow::Result<Vec<AgentLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, epoch_number, agent_type, summary, payload, created_at
             FROM agent_logs WHERE run_id = ?1 ORDER BY rowid ASC",
        )?;

        let rows = stmt.query_map(params![run_id], |row| {
            let agent_type_raw: String = row.get(3)?;
            let payload_raw: Option<String> = row.get(5)?;
            let created_raw: String = row.get(6)?;
            Ok(AgentLog {
                id: row.get(0)?,
                run_id: row.get(1)?,
                epoch_number: row.get(2)?,
                agent_type: AgentType::parse(&agent_type_raw).unwrap_or(AgentType::Generator),
                summary: row.get(4)?,
                payload: payload_raw
                    .and_then(|raw| serde_json::from_str(&raw).ok())
                    .unwrap_or(serde_json::Value::Null),
                created_at: parse_ts(Some(created_raw)).unwrap_or_else(Utc::now),
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    /// Get a reference to the underlying connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn heuristic_from_row(row: &Row<'_>) -> rusqlite::Result<HeuristicEntry> {
    let last_updated_raw: String = row.get(7)?;
    Ok(HeuristicEntry {
        id: row.get(0)?,
        section: row.get(1)?,
        content: row.get(2)?,
        helpful_count: row.get(3)?,
        harmful_count: row.get(4)?,
        run_id: row.get(5)?,
        epoch_number: row.get(6)?,
        last_updated: parse_ts(Some(last_updated_raw)).unwrap_or_else(Utc::now),
    })
}

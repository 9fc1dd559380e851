// src/core/types.rs — Core domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a training run. `Running` is the only non-terminal state
/// after start; everything else is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Stopped => "stopped",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "stopped" => Some(RunStatus::Stopped),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk dimension of a classification, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::Low => "LOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(RiskLevel::Critical),
            "HIGH" => Some(RiskLevel::High),
            "MEDIUM" => Some(RiskLevel::Medium),
            "LOW" => Some(RiskLevel::Low),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleSplit {
    Train,
    Eval,
}

impl SampleSplit {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleSplit::Train => "train",
            SampleSplit::Eval => "eval",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "train" => Some(SampleSplit::Train),
            "eval" => Some(SampleSplit::Eval),
            _ => None,
        }
    }
}

impl fmt::Display for SampleSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Generator,
    Reflector,
    Curator,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Generator => "generator",
            AgentType::Reflector => "reflector",
            AgentType::Curator => "curator",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "generator" => Some(AgentType::Generator),
            "reflector" => Some(AgentType::Reflector),
            "curator" => Some(AgentType::Curator),
            _ => None,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A training run: one sequential epoch loop over a fixed eval split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub id: String,
    pub name: String,
    pub max_epochs: u32,
    pub plateau_threshold: f64,
    pub plateau_patience: u32,
    pub status: RunStatus,
    pub stop_requested: bool,
    pub failure_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TrainingRun {
    pub fn new(
        name: impl Into<String>,
        max_epochs: u32,
        plateau_threshold: f64,
        plateau_patience: u32,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            max_epochs,
            plateau_threshold,
            plateau_patience,
            status: RunStatus::Pending,
            stop_requested: false,
            failure_reason: None,
            started_at: None,
            completed_at: None,
            last_activity_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Per-epoch metrics, appended once per completed epoch.
/// `heuristics_added` is backfilled after curation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochResult {
    pub run_id: String,
    pub epoch_number: u32,
    pub category_f1: f64,
    pub risk_f1: f64,
    pub overall_f1: f64,
    pub accuracy: f64,
    pub playbook_size: u32,
    pub errors_found: u32,
    pub heuristics_added: u32,
    pub created_at: DateTime<Utc>,
}

/// A labeled sample. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSample {
    pub id: String,
    pub run_id: String,
    pub split: SampleSplit,
    pub text: String,
    pub true_category: String,
    pub true_risk: RiskLevel,
}

impl TrainingSample {
    pub fn new(
        run_id: impl Into<String>,
        split: SampleSplit,
        text: impl Into<String>,
        true_category: impl Into<String>,
        true_risk: RiskLevel,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            split,
            text: text.into(),
            true_category: true_category.into(),
            true_risk,
        }
    }
}

/// A natural-language classification rule with effectiveness counters.
/// Baseline entries have no owning run/epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicEntry {
    pub id: String,
    pub section: String,
    pub content: String,
    pub helpful_count: i64,
    pub harmful_count: i64,
    pub run_id: Option<String>,
    pub epoch_number: Option<u32>,
    pub last_updated: DateTime<Utc>,
}

impl HeuristicEntry {
    pub fn baseline(section: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            section: section.into(),
            content: content.into(),
            helpful_count: 0,
            harmful_count: 0,
            run_id: None,
            epoch_number: None,
            last_updated: Utc::now(),
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.run_id.is_none()
    }

    /// Recover the risk level embedded in the rule text as a trailing
    /// "= LEVEL risk" phrase. Defaults to MEDIUM when absent.
    pub fn risk_level(&self) -> RiskLevel {
        let text = self.content.trim().trim_end_matches('.').trim_end();
        if let Some(idx) = text.rfind('=') {
            let tail = text[idx + 1..].trim();
            let lower = tail.to_ascii_lowercase();
            if let Some(level) = lower.strip_suffix("risk") {
                if let Some(risk) = RiskLevel::parse(level) {
                    return risk;
                }
            }
        }
        RiskLevel::Medium
    }
}

/// One analyzed misclassification. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reflection {
    pub id: String,
    pub run_id: String,
    pub epoch_number: u32,
    pub error_type: String,
    pub correct_approach: String,
    pub key_insight: String,
    pub affected_section: String,
    pub tag: String,
    pub input_text: String,
    pub predicted_category: String,
    pub predicted_risk: RiskLevel,
    pub expected_category: String,
    pub expected_risk: RiskLevel,
    pub created_at: DateTime<Utc>,
}

/// Audit-trail entry for one agent step within an epoch. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLog {
    pub id: String,
    pub run_id: String,
    pub epoch_number: u32,
    pub agent_type: AgentType,
    pub summary: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AgentLog {
    pub fn new(
        run_id: impl Into<String>,
        epoch_number: u32,
        agent_type: AgentType,
        summary: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            epoch_number,
            agent_type,
            summary: summary.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_round_trip() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Stopped,
            RunStatus::Failed,
        ] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("paused"), None);
    }

    #[test]
    fn terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Stopped.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn risk_level_parse_is_case_insensitive() {
        assert_eq!(RiskLevel::parse("critical"), Some(RiskLevel::Critical));
        assert_eq!(RiskLevel::parse(" High "), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse("SEVERE"), None);
    }

    #[test]
    fn embedded_risk_level_recovered_from_content() {
        let h = HeuristicEntry::baseline(
            "payments",
            "Wire transfers above $10k without prior history = HIGH risk",
        );
        assert_eq!(h.risk_level(), RiskLevel::High);

        let h = HeuristicEntry::baseline(
            "payments",
            "Repeated small refunds to one card = critical risk.",
        );
        assert_eq!(h.risk_level(), RiskLevel::Critical);
    }

    #[test]
    fn embedded_risk_level_defaults_to_medium() {
        let h = HeuristicEntry::baseline("general", "Flag messages with urgency pressure");
        assert_eq!(h.risk_level(), RiskLevel::Medium);

        // An '=' without the trailing "risk" marker is not a level phrase
        let h = HeuristicEntry::baseline("general", "score = high confidence");
        assert_eq!(h.risk_level(), RiskLevel::Medium);
    }
}

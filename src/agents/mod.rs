// src/agents/mod.rs — Typed agent steps over the model provider

pub mod llm;
pub mod parser;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::{AgentType, HeuristicEntry, RiskLevel};

pub use llm::LlmAgent;

/// A single item's external call failed or decoded to invalid output.
/// Recovered locally by skipping the item; never aborts the epoch.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub stage: AgentType,
    pub message: String,
}

impl ItemFailure {
    pub fn new(stage: AgentType, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step failed: {}", self.stage, self.message)
    }
}

impl std::error::Error for ItemFailure {}

/// Output of the Generate step for one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub risk: RiskLevel,
    pub cited_heuristic_ids: Vec<String>,
}

/// A misclassified sample handed to the Reflect step.
#[derive(Debug, Clone)]
pub struct ErrorCase {
    pub text: String,
    pub predicted_category: String,
    pub predicted_risk: RiskLevel,
    pub true_category: String,
    pub true_risk: RiskLevel,
}

/// Output of the Reflect step for one error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionDraft {
    pub error_type: String,
    pub correct_approach: String,
    pub key_insight: String,
    pub affected_section: String,
    pub tag: String,
}

/// One proposed playbook bullet from the Curate step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicDraft {
    pub section: String,
    pub content: String,
}

/// The three agent steps of one epoch. Each call is fallible per item;
/// callers skip the item on failure and continue the epoch.
#[async_trait]
pub trait AgentStep: Send + Sync {
    /// Generate: classify one sample against the playbook snapshot.
    async fn classify(
        &self,
        text: &str,
        playbook: &[HeuristicEntry],
    ) -> Result<Classification, ItemFailure>;

    /// Reflect: analyze one misclassification.
    async fn reflect(&self, case: &ErrorCase) -> Result<ReflectionDraft, ItemFailure>;

    /// Curate: turn one reflection into 0–2 playbook bullets.
    async fn curate(
        &self,
        reflection: &ReflectionDraft,
        playbook: &[HeuristicEntry],
    ) -> Result<Vec<HeuristicDraft>, ItemFailure>;
}

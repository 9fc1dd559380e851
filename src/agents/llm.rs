// src/agents/llm.rs — LLM-backed agent steps

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::types::{AgentType, HeuristicEntry, RiskLevel};
use crate::infra::config::ModelsConfig;
use crate::provider::{ChatRequest, Message, ModelProvider};

use super::{
    parser, AgentStep, Classification, ErrorCase, HeuristicDraft, ItemFailure, ReflectionDraft,
};

/// Production agent: one chat call per item, JSON in, JSON out.
pub struct LlmAgent {
    provider: Arc<dyn ModelProvider>,
    generator_model: String,
    reflector_model: String,
    curator_model: String,
}

impl LlmAgent {
    pub fn new(provider: Arc<dyn ModelProvider>, models: &ModelsConfig) -> Self {
        Self {
            provider,
            generator_model: models.generator_model(),
            reflector_model: models.reflector_model(),
            curator_model: models.curator_model(),
        }
    }

    async fn call(
        &self,
        stage: AgentType,
        model: &str,
        system: &str,
        prompt: String,
    ) -> Result<String, ItemFailure> {
        let response = self
            .provider
            .chat(ChatRequest {
                model: model.to_string(),
                messages: vec![Message::user(prompt)],
                max_tokens: Some(1024),
                temperature: Some(0.1),
                system: Some(system.to_string()),
            })
            .await
            .map_err(|e| ItemFailure::new(stage, e.to_string()))?;
        Ok(response.content)
    }

    /// Render the playbook snapshot for a prompt: one bullet per rule,
    /// id first so the model can cite it back.
    fn render_playbook(playbook: &[HeuristicEntry]) -> String {
        if playbook.is_empty() {
            return "(playbook is empty)".into();
        }
        playbook
            .iter()
            .map(|h| format!("[{}] ({}) {}", h.id, h.section, h.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// Wire shapes the model is asked to produce. Risk arrives as a string so
// a bad level is an ItemFailure, not a serde panic path.

#[derive(Deserialize)]
struct ClassifyWire {
    category: String,
    risk: String,
    #[serde(default)]
    cited_heuristic_ids: Vec<String>,
}

#[derive(Deserialize)]
struct ReflectWire {
    error_type: String,
    correct_approach: String,
    key_insight: String,
    affected_section: String,
    tag: String,
}

#[derive(Deserialize)]
struct CurateWire {
    #[serde(default)]
    bullets: Vec<BulletWire>,
}

#[derive(Deserialize)]
struct BulletWire {
    section: String,
    content: String,
}

#[async_trait]
impl AgentStep for LlmAgent {
    async fn classify(
        &self,
        text: &str,
        playbook: &[HeuristicEntry],
    ) -> Result<Classification, ItemFailure> {
        let prompt = format!(
            "Classify the following text using the playbook rules below.\n\n\
             ## Playbook\n{}\n\n\
             ## Text\n{}\n\n\
             Respond with a single JSON object:\n\
             {{\"category\": \"<category>\", \"risk\": \"CRITICAL|HIGH|MEDIUM|LOW\", \
             \"cited_heuristic_ids\": [\"<id of each rule that influenced the call>\"]}}",
            Self::render_playbook(playbook),
            text
        );

        let raw = self
            .call(
                AgentType::Generator,
                &self.generator_model,
                "You are a careful text classifier. Answer with JSON only.",
                prompt,
            )
            .await?;

        let wire: ClassifyWire = parser::decode(&raw, AgentType::Generator)?;
        let risk = RiskLevel::parse(&wire.risk).ok_or_else(|| {
            ItemFailure::new(
                AgentType::Generator,
                format!("unknown risk level '{}'", wire.risk),
            )
        })?;

        Ok(Classification {
            category: wire.category,
            risk,
            cited_heuristic_ids: wire.cited_heuristic_ids,
        })
    }

    async fn reflect(&self, case: &ErrorCase) -> Result<ReflectionDraft, ItemFailure> {
        let prompt = format!(
            "A classifier got this sample wrong. Analyze the mistake.\n\n\
             ## Sample\n{}\n\n\
             ## Predicted\ncategory: {}, risk: {}\n\n\
             ## Expected\ncategory: {}, risk: {}\n\n\
             Respond with a single JSON object:\n\
             {{\"error_type\": \"...\", \"correct_approach\": \"...\", \"key_insight\": \"...\", \
             \"affected_section\": \"<playbook section this belongs to>\", \"tag\": \"<short-slug>\"}}",
            case.text,
            case.predicted_category,
            case.predicted_risk,
            case.true_category,
            case.true_risk
        );

        let raw = self
            .call(
                AgentType::Reflector,
                &self.reflector_model,
                "You analyze classification errors. Answer with JSON only.",
                prompt,
            )
            .await?;

        let wire: ReflectWire = parser::decode(&raw, AgentType::Reflector)?;
        Ok(ReflectionDraft {
            error_type: wire.error_type,
            correct_approach: wire.correct_approach,
            key_insight: wire.key_insight,
            affected_section: wire.affected_section,
            tag: wire.tag,
        })
    }

    async fn curate(
        &self,
        reflection: &ReflectionDraft,
        playbook: &[HeuristicEntry],
    ) -> Result<Vec<HeuristicDraft>, ItemFailure> {
        let prompt = format!(
            "Given this error analysis, propose at most two new playbook rules that would \
             prevent the mistake. Do not restate rules already in the playbook. Each rule \
             should end with the phrase \"= LEVEL risk\" naming its risk level. Propose \
             nothing if the playbook already covers the case.\n\n\
             ## Playbook\n{}\n\n\
             ## Error analysis\nerror_type: {}\ncorrect_approach: {}\nkey_insight: {}\n\
             affected_section: {}\ntag: {}\n\n\
             Respond with a single JSON object:\n\
             {{\"bullets\": [{{\"section\": \"...\", \"content\": \"... = HIGH risk\"}}]}}",
            Self::render_playbook(playbook),
            reflection.error_type,
            reflection.correct_approach,
            reflection.key_insight,
            reflection.affected_section,
            reflection.tag
        );

        let raw = self
            .call(
                AgentType::Curator,
                &self.curator_model,
                "You maintain a playbook of classification rules. Answer with JSON only.",
                prompt,
            )
            .await?;

        let wire: CurateWire = parser::decode(&raw, AgentType::Curator)?;
        let mut bullets: Vec<HeuristicDraft> = wire
            .bullets
            .into_iter()
            .filter(|b| !b.content.trim().is_empty())
            .map(|b| HeuristicDraft {
                section: b.section,
                content: b.content,
            })
            .collect();
        bullets.truncate(2);
        Ok(bullets)
    }
}

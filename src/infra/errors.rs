// src/infra/errors.rs — Error types for playbook

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainerError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Run lifecycle errors
    #[error("Run '{0}' not found")]
    RunNotFound(String),

    #[error("Run '{id}' is '{status}', expected '{expected}'")]
    InvalidRunState {
        id: String,
        status: String,
        expected: String,
    },

    #[error("Evaluation split for run '{0}' is empty")]
    EmptyEvalSplit(String),

    // User errors
    #[error("No provider configured. Set ANTHROPIC_API_KEY or add [models] to config.toml.")]
    NoProvider,

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrainerError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            TrainerError::Provider {
                retriable: true,
                ..
            } | TrainerError::RateLimited { .. }
        )
    }
}

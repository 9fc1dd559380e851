// src/evaluator/mod.rs — Prediction scoring

pub mod metrics;

pub use metrics::{evaluate, EvalReport, ScoredSample};

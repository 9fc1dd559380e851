// src/evaluator/metrics.rs — Macro-F1 and accuracy over scored predictions
//
// Both dimensions (category, risk) are scored independently as
// one-vs-rest over the labels present in the batch. A sample is correct
// only when both dimensions match exactly. Every metric is zero-safe:
// an empty prediction set produces all-zero metrics, never a division
// error.

use std::collections::BTreeSet;

use crate::core::types::RiskLevel;

/// One sample that survived the Generate step, with its prediction.
#[derive(Debug, Clone)]
pub struct ScoredSample {
    pub sample_id: String,
    pub text: String,
    pub true_category: String,
    pub true_risk: RiskLevel,
    pub predicted_category: String,
    pub predicted_risk: RiskLevel,
    pub cited_heuristic_ids: Vec<String>,
}

impl ScoredSample {
    /// Exact match on both dimensions, no partial credit.
    pub fn is_correct(&self) -> bool {
        self.predicted_category == self.true_category && self.predicted_risk == self.true_risk
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalReport {
    pub category_f1: f64,
    pub risk_f1: f64,
    pub overall_f1: f64,
    pub accuracy: f64,
    pub total: usize,
    pub correct: usize,
}

impl EvalReport {
    pub fn errors(&self) -> usize {
        self.total - self.correct
    }
}

/// Compute the full metric set for one epoch's scored samples.
pub fn evaluate(samples: &[ScoredSample]) -> EvalReport {
    if samples.is_empty() {
        return EvalReport::default();
    }

    let category_pairs: Vec<(&str, &str)> = samples
        .iter()
        .map(|s| (s.true_category.as_str(), s.predicted_category.as_str()))
        .collect();
    let risk_pairs: Vec<(RiskLevel, RiskLevel)> = samples
        .iter()
        .map(|s| (s.true_risk, s.predicted_risk))
        .collect();

    let category_f1 = macro_f1(&category_pairs);
    let risk_f1 = macro_f1(&risk_pairs);

    let correct = samples.iter().filter(|s| s.is_correct()).count();

    EvalReport {
        category_f1,
        risk_f1,
        overall_f1: (category_f1 + risk_f1) / 2.0,
        accuracy: correct as f64 / samples.len() as f64,
        total: samples.len(),
        correct,
    }
}

/// Macro-F1 over (true, predicted) pairs: mean of per-label one-vs-rest
/// F1, averaged over the distinct true labels observed in the batch.
fn macro_f1<L: Ord + Copy>(pairs: &[(L, L)]) -> f64 {
    let labels: BTreeSet<L> = pairs.iter().map(|(truth, _)| *truth).collect();
    if labels.is_empty() {
        return 0.0;
    }

    let sum: f64 = labels
        .iter()
        .map(|&label| {
            let mut tp = 0u32;
            let mut fp = 0u32;
            let mut fn_ = 0u32;
            for &(truth, predicted) in pairs {
                match (truth == label, predicted == label) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            f1(tp, fp, fn_)
        })
        .sum();

    sum / labels.len() as f64
}

pub fn precision(tp: u32, fp: u32) -> f64 {
    if tp + fp == 0 {
        0.0
    } else {
        tp as f64 / (tp + fp) as f64
    }
}

pub fn recall(tp: u32, fn_: u32) -> f64 {
    if tp + fn_ == 0 {
        0.0
    } else {
        tp as f64 / (tp + fn_) as f64
    }
}

pub fn f1(tp: u32, fp: u32, fn_: u32) -> f64 {
    let p = precision(tp, fp);
    let r = recall(tp, fn_);
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(
        true_category: &str,
        true_risk: RiskLevel,
        predicted_category: &str,
        predicted_risk: RiskLevel,
    ) -> ScoredSample {
        ScoredSample {
            sample_id: uuid::Uuid::new_v4().to_string(),
            text: "sample".into(),
            true_category: true_category.into(),
            true_risk,
            predicted_category: predicted_category.into(),
            predicted_risk,
            cited_heuristic_ids: vec![],
        }
    }

    #[test]
    fn empty_prediction_set_is_all_zero() {
        let report = evaluate(&[]);
        assert_eq!(report, EvalReport::default());
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.overall_f1, 0.0);
    }

    #[test]
    fn perfect_predictions_score_one() {
        let samples = vec![
            scored("fraud", RiskLevel::High, "fraud", RiskLevel::High),
            scored("benign", RiskLevel::Low, "benign", RiskLevel::Low),
        ];
        let report = evaluate(&samples);
        assert!((report.category_f1 - 1.0).abs() < 1e-9);
        assert!((report.risk_f1 - 1.0).abs() < 1e-9);
        assert!((report.overall_f1 - 1.0).abs() < 1e-9);
        assert!((report.accuracy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn accuracy_requires_both_dimensions() {
        // Category right, risk wrong => not correct
        let samples = vec![
            scored("fraud", RiskLevel::High, "fraud", RiskLevel::Low),
            scored("fraud", RiskLevel::High, "fraud", RiskLevel::High),
        ];
        let report = evaluate(&samples);
        assert!((report.accuracy - 0.5).abs() < 1e-9);
        assert_eq!(report.correct, 1);
        assert_eq!(report.errors(), 1);
        // Category dimension alone is perfect
        assert!((report.category_f1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overall_f1_is_unweighted_mean_of_dimensions() {
        let samples = vec![
            scored("fraud", RiskLevel::High, "fraud", RiskLevel::Low),
            scored("benign", RiskLevel::Low, "fraud", RiskLevel::Low),
        ];
        let report = evaluate(&samples);
        let expected = (report.category_f1 + report.risk_f1) / 2.0;
        assert!((report.overall_f1 - expected).abs() < 1e-12);
    }

    #[test]
    fn macro_f1_averages_over_observed_true_labels_only() {
        // True labels: {a, b}. "c" is only ever predicted, so it does
        // not contribute a per-label term.
        let pairs = vec![("a", "a"), ("b", "c")];
        // label a: tp=1, fp=0, fn=0 -> f1 = 1
        // label b: tp=0, fp=0, fn=1 -> f1 = 0
        let got = macro_f1(&pairs);
        assert!((got - 0.5).abs() < 1e-9);
    }

    #[test]
    fn metric_bounds_hold() {
        let samples = vec![
            scored("a", RiskLevel::High, "b", RiskLevel::Low),
            scored("b", RiskLevel::Low, "a", RiskLevel::High),
            scored("a", RiskLevel::Medium, "a", RiskLevel::Medium),
        ];
        let report = evaluate(&samples);
        for value in [
            report.category_f1,
            report.risk_f1,
            report.overall_f1,
            report.accuracy,
        ] {
            assert!((0.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn f1_is_zero_when_precision_plus_recall_is_zero() {
        assert_eq!(f1(0, 0, 0), 0.0);
        assert_eq!(f1(0, 3, 2), 0.0);
        assert_eq!(precision(0, 0), 0.0);
        assert_eq!(recall(0, 0), 0.0);
    }
}

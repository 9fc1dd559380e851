// src/core/plateau.rs — Plateau detection over epoch metrics
//
// The verdict depends solely on `patience`: a run stalls when `patience`
// epochs have passed since the best overall F1. `threshold` is surfaced
// in the human-readable message only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauConfig {
    pub threshold: f64,
    pub patience: u32,
}

/// One epoch's position in the metric sequence, ordered by epoch_number.
#[derive(Debug, Clone, Copy)]
pub struct EpochPoint {
    pub epoch_number: u32,
    pub overall_f1: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauVerdict {
    pub best_epoch: u32,
    pub best_f1: f64,
    pub latest_f1: f64,
    /// latest_f1 − best_f1; negative or zero once the run has stalled.
    pub improvement: f64,
    pub epochs_without_improvement: u32,
    pub should_stop: bool,
    pub message: String,
}

/// Inspect an ascending epoch sequence for a plateau. Zero epochs give
/// no verdict; a single epoch never stops.
pub fn detect(points: &[EpochPoint], config: &PlateauConfig) -> Option<PlateauVerdict> {
    if points.is_empty() {
        return None;
    }

    // Strictly greatest F1, first occurrence on tie.
    let mut best_idx = 0usize;
    for (idx, point) in points.iter().enumerate() {
        if point.overall_f1 > points[best_idx].overall_f1 {
            best_idx = idx;
        }
    }

    let best = points[best_idx];
    let latest = points[points.len() - 1];
    let epochs_without_improvement = (points.len() - 1 - best_idx) as u32;
    let should_stop = points.len() > 1 && epochs_without_improvement >= config.patience;

    let message = if should_stop {
        format!(
            "training plateaued: best overall F1 {:.4} at epoch {}, no improvement for {} epoch(s) (threshold {:.4}, patience {})",
            best.overall_f1, best.epoch_number, epochs_without_improvement, config.threshold, config.patience
        )
    } else {
        format!(
            "best overall F1 {:.4} at epoch {}, {} epoch(s) without improvement (threshold {:.4}, patience {})",
            best.overall_f1, best.epoch_number, epochs_without_improvement, config.threshold, config.patience
        )
    };

    Some(PlateauVerdict {
        best_epoch: best.epoch_number,
        best_f1: best.overall_f1,
        latest_f1: latest.overall_f1,
        improvement: latest.overall_f1 - best.overall_f1,
        epochs_without_improvement,
        should_stop,
        message,
    })
}

/// Continuation decision for the run loop: stop at the epoch cap, else
/// keep going until a plateau verdict says stop.
pub fn should_continue(points: &[EpochPoint], max_epochs: u32, config: &PlateauConfig) -> bool {
    if points.len() as u32 >= max_epochs {
        return false;
    }
    match detect(points, config) {
        Some(verdict) => !verdict.should_stop,
        None => true,
    }
}

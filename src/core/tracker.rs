// src/core/tracker.rs — Per-heuristic effectiveness deltas
//
// The Generate step records one helpful or harmful tick per citation.
// Deltas accumulate in memory for the epoch and are flushed through the
// store's atomic add-delta update, so concurrent runs could never lose a
// read-modify-write race.

use std::collections::HashMap;

use crate::store::store::Store;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub helpful: i64,
    pub harmful: i64,
}

#[derive(Debug, Default)]
pub struct EffectivenessTracker {
    deltas: HashMap<String, CounterDelta>,
}

impl EffectivenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one scored sample: every cited heuristic gets a helpful
    /// tick if the prediction was correct, a harmful tick otherwise.
    pub fn record(&mut self, cited_heuristic_ids: &[String], correct: bool) {
        for id in cited_heuristic_ids {
            let delta = self.deltas.entry(id.clone()).or_default();
            if correct {
                delta.helpful += 1;
            } else {
                delta.harmful += 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn delta_for(&self, heuristic_id: &str) -> CounterDelta {
        self.deltas.get(heuristic_id).copied().unwrap_or_default()
    }

    /// Apply all accumulated deltas as atomic increments. Returns the
    /// number of heuristics touched; the tracker is left empty.
    pub fn flush(&mut self, store: &Store) -> anyhow::Result<usize> {
        let touched = self.deltas.len();
        for (id, delta) in self.deltas.drain() {
            store.increment_heuristic_counters(&id, delta.helpful, delta.harmful)?;
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn citations_accumulate_within_an_epoch() {
        let mut tracker = EffectivenessTracker::new();
        let cited = vec!["h1".to_string()];

        tracker.record(&cited, true);
        tracker.record(&cited, true);
        tracker.record(&cited, true);
        tracker.record(&cited, false);

        let delta = tracker.delta_for("h1");
        assert_eq!(delta.helpful, 3);
        assert_eq!(delta.harmful, 1);
    }

    #[test]
    fn each_cited_heuristic_gets_its_own_tick() {
        let mut tracker = EffectivenessTracker::new();
        tracker.record(&["h1".to_string(), "h2".to_string()], false);

        assert_eq!(tracker.delta_for("h1").harmful, 1);
        assert_eq!(tracker.delta_for("h2").harmful, 1);
        assert_eq!(tracker.delta_for("h3"), CounterDelta::default());
    }

    #[test]
    fn uncited_samples_record_nothing() {
        let mut tracker = EffectivenessTracker::new();
        tracker.record(&[], true);
        assert!(tracker.is_empty());
    }
}

// tests/store_test.rs — Integration test: SQLite round-trip (store CRUD)

use chrono::Utc;
use playbook::core::types::{
    AgentLog, AgentType, EpochResult, HeuristicEntry, Reflection, RiskLevel, RunStatus,
    SampleSplit, TrainingRun, TrainingSample,
};
use playbook::store::{self, Store};
use pretty_assertions::assert_eq;

fn test_store() -> Store {
    store::in_memory().unwrap()
}

fn test_run() -> TrainingRun {
    TrainingRun::new("round-trip", 10, 0.01, 3)
}

#[test]
fn test_run_round_trip() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();

    let loaded = store.get_run(&run.id).unwrap().unwrap();
    assert_eq!(loaded.id, run.id);
    assert_eq!(loaded.name, "round-trip");
    assert_eq!(loaded.max_epochs, 10);
    assert_eq!(loaded.plateau_threshold, 0.01);
    assert_eq!(loaded.plateau_patience, 3);
    assert_eq!(loaded.status, RunStatus::Pending);
    assert!(!loaded.stop_requested);
    assert!(loaded.started_at.is_none());
    assert!(loaded.failure_reason.is_none());
}

#[test]
fn test_run_lifecycle_transitions() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();

    assert!(store.mark_run_running(&run.id).unwrap());
    let loaded = store.get_run(&run.id).unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Running);
    assert!(loaded.started_at.is_some());
    assert!(loaded.last_activity_at.is_some());

    // Second start attempt is rejected: the run is no longer pending.
    assert!(!store.mark_run_running(&run.id).unwrap());

    store.finish_run(&run.id, RunStatus::Completed).unwrap();
    let loaded = store.get_run(&run.id).unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Completed);
    assert!(loaded.completed_at.is_some());
}

#[test]
fn test_fail_run_if_running_is_conditional() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();
    store.mark_run_running(&run.id).unwrap();

    assert!(store.fail_run_if_running(&run.id, "orphaned").unwrap());
    let loaded = store.get_run(&run.id).unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Failed);
    assert_eq!(loaded.failure_reason.as_deref(), Some("orphaned"));

    // Already terminal: a second attempt touches nothing.
    assert!(!store.fail_run_if_running(&run.id, "again").unwrap());
    let loaded = store.get_run(&run.id).unwrap().unwrap();
    assert_eq!(loaded.failure_reason.as_deref(), Some("orphaned"));
}

#[test]
fn test_request_stop_round_trip() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();

    assert!(store.request_stop(&run.id).unwrap());
    assert!(store.get_run(&run.id).unwrap().unwrap().stop_requested);

    assert!(!store.request_stop("no-such-run").unwrap());
}

#[test]
fn test_epoch_result_round_trip_and_backfill() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();

    for epoch in 1..=2u32 {
        store
            .insert_epoch_result(&EpochResult {
                run_id: run.id.clone(),
                epoch_number: epoch,
                category_f1: 0.8,
                risk_f1: 0.6,
                overall_f1: 0.7,
                accuracy: 0.75,
                playbook_size: 12,
                errors_found: 3,
                heuristics_added: 0,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    store.set_epoch_heuristics_added(&run.id, 2, 4).unwrap();

    let results = store.list_epoch_results(&run.id).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].epoch_number, 1);
    assert_eq!(results[0].heuristics_added, 0);
    assert_eq!(results[1].epoch_number, 2);
    assert_eq!(results[1].heuristics_added, 4);
    assert_eq!(results[1].overall_f1, 0.7);
    assert_eq!(results[1].playbook_size, 12);
}

#[test]
fn test_sample_round_trip_filters_by_split() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();

    store
        .insert_sample(&TrainingSample::new(
            &run.id,
            SampleSplit::Eval,
            "wire transfer to new payee",
            "fraud",
            RiskLevel::High,
        ))
        .unwrap();
    store
        .insert_sample(&TrainingSample::new(
            &run.id,
            SampleSplit::Train,
            "monthly newsletter",
            "benign",
            RiskLevel::Low,
        ))
        .unwrap();

    let eval = store.list_samples(&run.id, SampleSplit::Eval).unwrap();
    assert_eq!(eval.len(), 1);
    assert_eq!(eval[0].text, "wire transfer to new payee");
    assert_eq!(eval[0].true_category, "fraud");
    assert_eq!(eval[0].true_risk, RiskLevel::High);

    let train = store.list_samples(&run.id, SampleSplit::Train).unwrap();
    assert_eq!(train.len(), 1);
}

#[test]
fn test_heuristic_round_trip_and_atomic_increment() {
    let store = test_store();

    let baseline = HeuristicEntry::baseline("payments", "New payee + urgency = HIGH risk");
    store.insert_heuristic(&baseline).unwrap();

    store
        .increment_heuristic_counters(&baseline.id, 3, 1)
        .unwrap();
    store
        .increment_heuristic_counters(&baseline.id, 2, 0)
        .unwrap();

    let loaded = store.get_heuristic(&baseline.id).unwrap().unwrap();
    assert_eq!(loaded.helpful_count, 5);
    assert_eq!(loaded.harmful_count, 1);
    assert_eq!(loaded.section, "payments");
    assert!(loaded.is_baseline());
}

#[test]
fn test_playbook_at_epoch_visibility() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();

    let baseline = HeuristicEntry::baseline("general", "Urgency pressure = MEDIUM risk");
    store.insert_heuristic(&baseline).unwrap();

    for epoch in 1..=3u32 {
        store
            .insert_heuristic(&HeuristicEntry {
                id: format!("{}-e{}-h0", run.id, epoch),
                section: "general".into(),
                content: format!("rule curated in epoch {epoch} = LOW risk"),
                helpful_count: 0,
                harmful_count: 0,
                run_id: Some(run.id.clone()),
                epoch_number: Some(epoch),
                last_updated: Utc::now(),
            })
            .unwrap();
    }

    // Another run's heuristics are never visible.
    store
        .insert_heuristic(&HeuristicEntry {
            id: "other-e1-h0".into(),
            section: "general".into(),
            content: "foreign rule = LOW risk".into(),
            helpful_count: 0,
            harmful_count: 0,
            run_id: Some("other-run".into()),
            epoch_number: Some(1),
            last_updated: Utc::now(),
        })
        .unwrap();

    // Epoch 1 sees only the baseline.
    assert_eq!(store.playbook_at_epoch(&run.id, 1).unwrap().len(), 1);
    // Epoch 3 sees baseline + epochs 1 and 2.
    let at_three = store.playbook_at_epoch(&run.id, 3).unwrap();
    assert_eq!(at_three.len(), 3);
    assert!(at_three.iter().all(|h| h.run_id.as_deref() != Some("other-run")));
}

#[test]
fn test_reflection_round_trip() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();

    let reflection = Reflection {
        id: "r1".into(),
        run_id: run.id.clone(),
        epoch_number: 2,
        error_type: "risk_underestimate".into(),
        correct_approach: "weigh payee novelty higher".into(),
        key_insight: "urgency plus new payee compounds".into(),
        affected_section: "payments".into(),
        tag: "new-payee".into(),
        input_text: "wire $9,900 today".into(),
        predicted_category: "benign".into(),
        predicted_risk: RiskLevel::Low,
        expected_category: "fraud".into(),
        expected_risk: RiskLevel::High,
        created_at: Utc::now(),
    };
    store.insert_reflection(&reflection).unwrap();

    let loaded = store.list_reflections(&run.id, 2).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].error_type, "risk_underestimate");
    assert_eq!(loaded[0].predicted_risk, RiskLevel::Low);
    assert_eq!(loaded[0].expected_risk, RiskLevel::High);
    assert_eq!(loaded[0].tag, "new-payee");

    assert!(store.list_reflections(&run.id, 1).unwrap().is_empty());
}

#[test]
fn test_agent_log_round_trip() {
    let store = test_store();
    let run = test_run();
    store.insert_run(&run).unwrap();

    store
        .insert_agent_log(&AgentLog::new(
            &run.id,
            1,
            AgentType::Curator,
            "accepted 2 heuristic(s)",
            serde_json::json!({"accepted": 2, "skipped": 0}),
        ))
        .unwrap();

    let logs = store.list_agent_logs(&run.id).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].agent_type, AgentType::Curator);
    assert_eq!(logs[0].summary, "accepted 2 heuristic(s)");
    assert_eq!(logs[0].payload["accepted"], 2);
}

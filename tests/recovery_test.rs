// tests/recovery_test.rs — Integration test: orphaned-run recovery

use chrono::{Duration, Utc};
use playbook::core::types::{RunStatus, TrainingRun};
use playbook::infra::config::RecoveryConfig;
use playbook::recovery::RecoverySupervisor;
use playbook::store::{self, SharedStore};

fn shared_store() -> SharedStore {
    store::shared(store::in_memory().unwrap())
}

fn supervisor(store: &SharedStore) -> RecoverySupervisor {
    RecoverySupervisor::new(store.clone(), &RecoveryConfig::default())
}

/// Insert a running run and overwrite its timestamps with raw SQL, the
/// same way a crashed process would leave them behind.
fn running_run(
    store: &SharedStore,
    name: &str,
    started_secs_ago: Option<i64>,
    active_secs_ago: Option<i64>,
) -> String {
    let run = TrainingRun::new(name, 10, 0.01, 3);
    let s = store.lock().unwrap();
    s.insert_run(&run).unwrap();
    s.mark_run_running(&run.id).unwrap();

    let started = started_secs_ago.map(|secs| (Utc::now() - Duration::seconds(secs)).to_rfc3339());
    let active = active_secs_ago.map(|secs| (Utc::now() - Duration::seconds(secs)).to_rfc3339());
    s.conn()
        .execute(
            "UPDATE training_runs SET started_at = ?1, last_activity_at = ?2 WHERE id = ?3",
            rusqlite::params![started, active, run.id],
        )
        .unwrap();
    run.id
}

fn status_of(store: &SharedStore, id: &str) -> RunStatus {
    store.lock().unwrap().get_run(id).unwrap().unwrap().status
}

#[test]
fn stale_run_is_failed_exactly_once() {
    let store = shared_store();
    let stale = running_run(&store, "stale", Some(1200), Some(900));

    let report = supervisor(&store).recover();
    assert_eq!(report.stale_runs_failed, 1);
    assert_eq!(report.timed_out_runs_failed, 0);
    assert_eq!(status_of(&store, &stale), RunStatus::Failed);

    let reason = store
        .lock()
        .unwrap()
        .get_run(&stale)
        .unwrap()
        .unwrap()
        .failure_reason
        .unwrap();
    assert!(reason.contains("heartbeat stale"), "reason: {reason}");

    // A second scan finds nothing left to recover.
    let report = supervisor(&store).recover();
    assert_eq!(report.total(), 0);
}

#[test]
fn recently_active_run_is_left_untouched() {
    let store = shared_store();
    let active = running_run(&store, "active", Some(600), Some(30));

    let report = supervisor(&store).recover();
    assert_eq!(report.total(), 0);
    assert_eq!(status_of(&store, &active), RunStatus::Running);
}

#[test]
fn staleness_uses_the_newer_of_activity_and_start() {
    let store = shared_store();
    // Heartbeat is old but the run just started (e.g. restarted loop):
    // max(last_activity_at, started_at) is fresh, so not stale.
    let fresh_start = running_run(&store, "fresh-start", Some(10), Some(3600));

    let report = supervisor(&store).recover();
    assert_eq!(report.total(), 0);
    assert_eq!(status_of(&store, &fresh_start), RunStatus::Running);
}

#[test]
fn run_with_no_timestamps_is_immediately_stale() {
    let store = shared_store();
    let ghost = running_run(&store, "ghost", None, None);

    let report = supervisor(&store).recover();
    assert_eq!(report.stale_runs_failed, 1);
    assert_eq!(status_of(&store, &ghost), RunStatus::Failed);

    let reason = store
        .lock()
        .unwrap()
        .get_run(&ghost)
        .unwrap()
        .unwrap()
        .failure_reason
        .unwrap();
    assert!(reason.contains("no recorded timestamps"), "reason: {reason}");
}

#[test]
fn timed_out_run_gets_a_distinct_reason() {
    let store = shared_store();
    // Active heartbeat, but started 25 hours ago: only the timeout
    // scan catches it.
    let old = running_run(&store, "marathon", Some(25 * 3600), Some(10));

    let report = supervisor(&store).recover();
    assert_eq!(report.stale_runs_failed, 0);
    assert_eq!(report.timed_out_runs_failed, 1);
    assert_eq!(status_of(&store, &old), RunStatus::Failed);

    let reason = store
        .lock()
        .unwrap()
        .get_run(&old)
        .unwrap()
        .unwrap()
        .failure_reason
        .unwrap();
    assert!(reason.contains("wall-clock budget"), "reason: {reason}");
}

#[test]
fn terminal_runs_are_ignored_by_both_scans() {
    let store = shared_store();
    let done = running_run(&store, "done", Some(25 * 3600), Some(25 * 3600));
    store
        .lock()
        .unwrap()
        .finish_run(&done, RunStatus::Completed)
        .unwrap();

    let pending = TrainingRun::new("pending", 10, 0.01, 3);
    store.lock().unwrap().insert_run(&pending).unwrap();

    let report = supervisor(&store).recover();
    assert_eq!(report.total(), 0);
    assert_eq!(status_of(&store, &done), RunStatus::Completed);
    assert_eq!(status_of(&store, &pending.id), RunStatus::Pending);
}

#[test]
fn custom_thresholds_are_respected() {
    let store = shared_store();
    let run = running_run(&store, "tight", Some(120), Some(90));

    // Default 300s threshold: not stale yet.
    let report = supervisor(&store).recover();
    assert_eq!(report.total(), 0);

    // A 60s threshold flips it.
    let tight = RecoverySupervisor::new(
        store.clone(),
        &RecoveryConfig {
            heartbeat_stale_secs: 60,
            run_timeout_secs: 86_400,
        },
    );
    let report = tight.recover();
    assert_eq!(report.stale_runs_failed, 1);
    assert_eq!(status_of(&store, &run), RunStatus::Failed);
}

// src/recovery/mod.rs — Orphaned-run recovery
//
// Two independent, idempotent scans over persisted run state: a stale
// scan (heartbeat too old or missing) and a timeout scan (run older
// than the wall-clock budget). Persisted status is the sole source of
// truth; the supervisor may run in a separate process while a
// controller is live. Internal errors are logged and counted as zero
// recoveries — recovery never blocks application availability.

use chrono::{DateTime, Duration, Utc};
use tracing::{error, warn};

use crate::infra::config::RecoveryConfig;
use crate::store::{self, SharedStore};

pub struct RecoverySupervisor {
    store: SharedStore,
    heartbeat_stale: Duration,
    run_timeout: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub stale_runs_failed: usize,
    pub timed_out_runs_failed: usize,
}

impl RecoveryReport {
    pub fn total(&self) -> usize {
        self.stale_runs_failed + self.timed_out_runs_failed
    }
}

impl RecoverySupervisor {
    pub fn new(store: SharedStore, config: &RecoveryConfig) -> Self {
        Self {
            store,
            heartbeat_stale: Duration::seconds(config.heartbeat_stale_secs as i64),
            run_timeout: Duration::seconds(config.run_timeout_secs as i64),
        }
    }

    /// Run both scans. Safe to call from startup, a periodic trigger, or
    /// a manual "recover now" request.
    pub fn recover(&self) -> RecoveryReport {
        let now = Utc::now();
        RecoveryReport {
            stale_runs_failed: self.scan_stale(now).unwrap_or_else(|e| {
                error!("stale scan failed: {e:#}");
                0
            }),
            timed_out_runs_failed: self.scan_timed_out(now).unwrap_or_else(|e| {
                error!("timeout scan failed: {e:#}");
                0
            }),
        }
    }

    /// Fail every running run whose heartbeat is older than the stale
    /// window. A run with no timestamp at all is immediately stale.
    fn scan_stale(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let running = store::lock(&self.store)?.list_running_runs()?;
        let mut recovered = 0usize;

        for run in &running {
            let last_seen = match (run.last_activity_at, run.started_at) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };

            let reason = match last_seen {
                Some(ts) if now - ts <= self.heartbeat_stale => continue,
                Some(ts) => format!(
                    "run heartbeat stale: no activity since {} (threshold {}s); \
                     marked failed by the recovery supervisor",
                    ts.to_rfc3339(),
                    self.heartbeat_stale.num_seconds()
                ),
                None => "run was running with no recorded timestamps; \
                         marked failed by the recovery supervisor"
                    .to_string(),
            };

            if store::lock(&self.store)?.fail_run_if_running(&run.id, &reason)? {
                warn!(run = %run.id, "recovered stale run");
                recovered += 1;
            }
        }

        Ok(recovered)
    }

    /// Fail every running run that exceeded the wall-clock budget.
    fn scan_timed_out(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let running = store::lock(&self.store)?.list_running_runs()?;
        let mut recovered = 0usize;

        for run in &running {
            let Some(started_at) = run.started_at else {
                continue; // no start timestamp: the stale scan owns this case
            };
            if now - started_at <= self.run_timeout {
                continue;
            }

            let reason = format!(
                "run exceeded the {}s wall-clock budget (started {}); \
                 marked failed by the recovery supervisor",
                self.run_timeout.num_seconds(),
                started_at.to_rfc3339()
            );

            if store::lock(&self.store)?.fail_run_if_running(&run.id, &reason)? {
                warn!(run = %run.id, "recovered timed-out run");
                recovered += 1;
            }
        }

        Ok(recovered)
    }
}

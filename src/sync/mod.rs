//! Reconciliation between the local write queue and the remote store.
//!
//! A full sync pushes queued local mutations to the remote store in FIFO
//! order, then replaces the local mirror with the remote snapshot. Each queue
//! entry ends as applied, skipped, or failed; failed entries stay queued.

use std::collections::HashSet;
use std::error::Error;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::now_utc_rfc3339;
use crate::domain::queue::QueueEntry;
use crate::locks::LockError;
use crate::store::{ActivityStore, LocalStore, StoreError};

mod replay;

use replay::{replay_entry, ReplayOutcome};

const BLOCKED_BY_EARLIER_FAILURE: &str = "blocked by an earlier failed entry for this activity";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncIssue {
    pub entry_id: i64,
    pub operation: String,
    pub activity: String,
    pub message: String,
    pub severity: IssueSeverity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub success: u64,
    pub skipped: u64,
    pub failed: u64,
    pub issues: Vec<SyncIssue>,
    pub pulled: bool,
    pub pulled_activities: usize,
}

impl SyncReport {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    fn record_skip(&mut self, entry: &QueueEntry, reason: &str) {
        self.skipped += 1;
        self.issues.push(SyncIssue {
            entry_id: entry.id,
            operation: entry.operation.as_str().to_string(),
            activity: entry.activity.clone(),
            message: reason.to_string(),
            severity: IssueSeverity::Warning,
        });
    }

    fn record_failure(&mut self, entry_id: i64, operation: &str, activity: &str, message: String) {
        self.failed += 1;
        self.issues.push(SyncIssue {
            entry_id,
            operation: operation.to_string(),
            activity: activity.to_string(),
            message,
            severity: IssueSeverity::Error,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Replace the local mirror even when some queue entries failed. The
    /// failed intents stay queued either way.
    pub pull_after_failed_push: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            pull_after_failed_push: true,
        }
    }
}

pub struct SyncService<'a> {
    remote: &'a dyn ActivityStore,
    local: &'a LocalStore,
    policy: SyncPolicy,
}

impl<'a> SyncService<'a> {
    pub fn new(remote: &'a dyn ActivityStore, local: &'a LocalStore) -> Self {
        Self {
            remote,
            local,
            policy: SyncPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replays the queue against the remote store. Per-entry failures are
    /// recorded in the report; only local queue I/O aborts the pass.
    pub fn push_queue(&self) -> Result<SyncReport, SyncError> {
        if !self.local.has_pending_entries()? {
            debug!("local queue is empty");
            return Ok(SyncReport::default());
        }
        let entries = self.local.drain_queue_ordered()?;
        let mut report = SyncReport::default();
        let mut processed = Vec::new();
        let mut blocked: HashSet<String> = HashSet::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(StoreError::InvalidQueueEntry {
                    id,
                    activity,
                    source,
                }) => {
                    warn!(id, activity = %activity, error = %source, "unreadable queue entry");
                    report.record_failure(id, "UNKNOWN", &activity, source.to_string());
                    blocked.insert(activity);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            if blocked.contains(&entry.activity) {
                report.record_failure(
                    entry.id,
                    entry.operation.as_str(),
                    &entry.activity,
                    BLOCKED_BY_EARLIER_FAILURE.to_string(),
                );
                continue;
            }

            match replay_entry(self.remote, &entry) {
                Ok(ReplayOutcome::Applied) => {
                    debug!(id = entry.id, operation = %entry.operation, activity = %entry.activity, "replayed queue entry");
                    report.success += 1;
                    processed.push(entry.id);
                }
                Ok(ReplayOutcome::Skipped(reason)) => {
                    debug!(id = entry.id, operation = %entry.operation, activity = %entry.activity, reason, "skipped queue entry");
                    report.record_skip(&entry, reason);
                    processed.push(entry.id);
                }
                Err(err) => {
                    warn!(id = entry.id, operation = %entry.operation, activity = %entry.activity, error = %err, "queue entry failed");
                    report.record_failure(
                        entry.id,
                        entry.operation.as_str(),
                        &entry.activity,
                        err.to_string(),
                    );
                    blocked.insert(entry.activity.clone());
                }
            }
        }

        for id in processed {
            self.local.remove_queue_entry(id)?;
        }

        info!(
            success = report.success,
            skipped = report.skipped,
            failed = report.failed,
            "pushed local queue"
        );
        Ok(report)
    }

    /// Overwrites the local mirror with the remote store's full contents.
    pub fn pull_snapshot(&self) -> Result<usize, SyncError> {
        let activities = self.remote.list_all()?;
        let count = self.local.replace_snapshot(&activities)?;
        info!(activities = count, "pulled remote snapshot");
        Ok(count)
    }

    /// Push, then pull. The push must come first so queued intents reach the
    /// remote store before the mirror is overwritten.
    pub fn full_sync(&self) -> Result<SyncReport, SyncError> {
        let mut report = self.push_queue()?;
        if report.has_failures() && !self.policy.pull_after_failed_push {
            info!(
                failed = report.failed,
                "skipping snapshot pull because queue entries failed"
            );
            return Ok(report);
        }
        report.pulled_activities = self.pull_snapshot()?;
        report.pulled = true;
        self.local.record_synced_at(&now_utc_rfc3339())?;
        Ok(report)
    }
}

#[derive(Debug)]
pub enum SyncError {
    Store(StoreError),
    Lock(LockError),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::Store(err) => write!(f, "{}", err),
            SyncError::Lock(LockError::Busy(path)) => write!(
                f,
                "another sync is already running (lock held at {})",
                path.display()
            ),
            SyncError::Lock(err) => write!(f, "{}", err),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SyncError::Store(err) => Some(err),
            SyncError::Lock(err) => Some(err),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        SyncError::Store(value)
    }
}

impl From<LockError> for SyncError {
    fn from(value: LockError) -> Self {
        SyncError::Lock(value)
    }
}

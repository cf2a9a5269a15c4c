use crate::domain::activity::{adjusted_priority, DEFAULT_PRIORITY};
use crate::domain::queue::{QueueEntry, QueueOperation};
use crate::store::{ActivityStore, StoreError};

pub(super) const ALREADY_EXISTS_REMOTELY: &str =
    "activity already exists in remote store (possibly added by another client)";
pub(super) const NO_LONGER_EXISTS_REMOTELY: &str = "activity no longer exists in remote store";
pub(super) const NO_DELTA_RECORDED: &str = "adjustment has no recorded delta";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReplayOutcome {
    Applied,
    Skipped(&'static str),
}

/// Applies one queued mutation to the remote store.
pub(super) fn replay_entry(
    remote: &dyn ActivityStore,
    entry: &QueueEntry,
) -> Result<ReplayOutcome, StoreError> {
    match entry.operation {
        QueueOperation::Add => {
            let priority = entry.payload.unwrap_or(DEFAULT_PRIORITY);
            match remote.add(&entry.activity, priority) {
                Ok(()) => Ok(ReplayOutcome::Applied),
                Err(err) if err.is_duplicate_name() => {
                    Ok(ReplayOutcome::Skipped(ALREADY_EXISTS_REMOTELY))
                }
                Err(err) => Err(err),
            }
        }
        QueueOperation::Delete => {
            remote.delete(&entry.activity)?;
            Ok(ReplayOutcome::Applied)
        }
        QueueOperation::Adjust => {
            let Some(delta) = entry.payload else {
                return Ok(ReplayOutcome::Skipped(NO_DELTA_RECORDED));
            };
            let Some(current) = remote.get(&entry.activity)? else {
                return Ok(ReplayOutcome::Skipped(NO_LONGER_EXISTS_REMOTELY));
            };
            let next = adjusted_priority(current.priority, delta);
            match remote.set_priority(&entry.activity, next) {
                Ok(()) => Ok(ReplayOutcome::Applied),
                // Deleted between the read and the write.
                Err(err) if err.is_not_found() => {
                    Ok(ReplayOutcome::Skipped(NO_LONGER_EXISTS_REMOTELY))
                }
                Err(err) => Err(err),
            }
        }
    }
}

use std::str::FromStr;

use rusqlite::Connection;
use tracing::debug;

use crate::db::{self, QueueRow};
use crate::domain::activity::Activity;
use crate::domain::queue::{PendingEntry, QueueEntry, QueueOperation};

use super::{ActivityStore, StoreError, StoreKind};

/// File-backed mirror of the remote store plus the offline write queue.
///
/// Every mutation made through [`ActivityStore`] is recorded in `sync_queue`
/// inside the same transaction as the row change, so the queue and the
/// mirror cannot drift apart.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = db::open_local(path)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn append_queue_entry(
        &self,
        operation: QueueOperation,
        name: &str,
        payload: Option<f64>,
    ) -> Result<i64, StoreError> {
        append(&self.conn, operation, name, payload)
    }

    /// Queue entries oldest first. Rows whose operation tag cannot be parsed
    /// come back as per-entry errors so a replay can report them in place.
    pub fn drain_queue_ordered(&self) -> Result<Vec<Result<QueueEntry, StoreError>>, StoreError> {
        let rows = db::list_queue_entries(&self.conn)?;
        Ok(rows.into_iter().map(decode_queue_row).collect())
    }

    /// Every queued row oldest first, including ones that cannot be decoded.
    pub fn pending_entries(&self) -> Result<Vec<PendingEntry>, StoreError> {
        let rows = db::list_queue_entries(&self.conn)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let problem = QueueOperation::from_str(&row.operation)
                    .err()
                    .map(|err| err.to_string());
                PendingEntry {
                    id: row.id,
                    operation: row.operation,
                    activity: row.activity,
                    payload: row.payload,
                    queued_at: row.queued_at,
                    problem,
                }
            })
            .collect())
    }

    pub fn remove_queue_entry(&self, id: i64) -> Result<bool, StoreError> {
        Ok(db::delete_queue_entry(&self.conn, id)?)
    }

    pub fn has_pending_entries(&self) -> Result<bool, StoreError> {
        Ok(self.pending_count()? > 0)
    }

    pub fn pending_count(&self) -> Result<u64, StoreError> {
        Ok(db::count_queue_entries(&self.conn)?)
    }

    /// Replaces every mirrored activity in one transaction. The queue is left
    /// untouched. On failure the previous mirror stays in place.
    pub fn replace_snapshot(&self, activities: &[Activity]) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let cleared = db::clear_activities(&tx)?;
        for activity in activities {
            db::insert_activity(&tx, &activity.name, activity.priority)
                .map_err(|err| StoreError::from_insert(err, &activity.name))?;
        }
        tx.commit()?;
        debug!(
            cleared,
            inserted = activities.len(),
            "replaced local activity snapshot"
        );
        Ok(activities.len())
    }

    pub fn last_synced_at(&self) -> Result<Option<String>, StoreError> {
        Ok(db::get_meta(&self.conn, "last_synced_at")?)
    }

    pub fn record_synced_at(&self, at: &str) -> Result<(), StoreError> {
        Ok(db::set_meta(&self.conn, "last_synced_at", at)?)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ActivityStore for LocalStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Local
    }

    fn list_all(&self) -> Result<Vec<Activity>, StoreError> {
        Ok(db::list_activities(&self.conn)?)
    }

    fn get(&self, name: &str) -> Result<Option<Activity>, StoreError> {
        Ok(db::get_activity(&self.conn, name)?)
    }

    fn add(&self, name: &str, priority: f64) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        db::insert_activity(&tx, name, priority).map_err(|err| StoreError::from_insert(err, name))?;
        append(&tx, QueueOperation::Add, name, Some(priority))?;
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = db::delete_activity(&tx, name)?;
        if removed {
            append(&tx, QueueOperation::Delete, name, None)?;
        }
        tx.commit()?;
        Ok(removed)
    }

    fn set_priority(&self, name: &str, priority: f64) -> Result<(), StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let current = db::get_activity(&tx, name)?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        db::update_priority(&tx, name, priority)?;
        let delta = priority - current.priority;
        if delta != 0.0 {
            append(&tx, QueueOperation::Adjust, name, Some(delta))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn max_priority(&self) -> Result<f64, StoreError> {
        Ok(db::max_priority(&self.conn)?)
    }

    fn select_weighted(&self, min_roll: f64) -> Result<Option<Activity>, StoreError> {
        Ok(db::select_weighted(&self.conn, min_roll)?)
    }
}

fn append(
    conn: &Connection,
    operation: QueueOperation,
    name: &str,
    payload: Option<f64>,
) -> Result<i64, StoreError> {
    let id = db::insert_queue_entry(conn, operation.as_str(), name, payload)?;
    debug!(id, operation = operation.as_str(), activity = name, "queued local mutation");
    Ok(id)
}

fn decode_queue_row(row: QueueRow) -> Result<QueueEntry, StoreError> {
    let operation =
        QueueOperation::from_str(&row.operation).map_err(|source| StoreError::InvalidQueueEntry {
            id: row.id,
            activity: row.activity.clone(),
            source,
        })?;
    Ok(QueueEntry {
        id: row.id,
        operation,
        activity: row.activity,
        payload: row.payload,
        queued_at: row.queued_at,
    })
}

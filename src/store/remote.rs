use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

use crate::db;
use crate::domain::activity::Activity;

use super::{ActivityStore, StoreError, StoreKind};

/// The authoritative store, reached through a shared location.
pub struct RemoteStore {
    conn: Connection,
    path: PathBuf,
}

impl RemoteStore {
    /// Opens an existing remote database and verifies it answers a query.
    pub fn connect(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = db::open_remote(&path.to_string_lossy(), busy_timeout)?;
        let store = Self {
            conn,
            path: path.to_path_buf(),
        };
        store.ping()?;
        Ok(store)
    }

    /// Creates the database and schema at `path` if missing.
    pub fn initialize(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(StoreError::Db(rusqlite::Error::InvalidPath(
                    parent.to_path_buf(),
                )));
            }
        }
        let conn = db::create_remote(&path.to_string_lossy(), busy_timeout)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn ping(&self) -> Result<(), StoreError> {
        Ok(db::ping(&self.conn)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivityStore for RemoteStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Remote
    }

    fn list_all(&self) -> Result<Vec<Activity>, StoreError> {
        Ok(db::list_activities(&self.conn)?)
    }

    fn get(&self, name: &str) -> Result<Option<Activity>, StoreError> {
        Ok(db::get_activity(&self.conn, name)?)
    }

    fn add(&self, name: &str, priority: f64) -> Result<(), StoreError> {
        db::insert_activity(&self.conn, name, priority)
            .map_err(|err| StoreError::from_insert(err, name))
    }

    fn delete(&self, name: &str) -> Result<bool, StoreError> {
        Ok(db::delete_activity(&self.conn, name)?)
    }

    fn set_priority(&self, name: &str, priority: f64) -> Result<(), StoreError> {
        if db::update_priority(&self.conn, name, priority)? {
            Ok(())
        } else {
            Err(StoreError::NotFound(name.to_string()))
        }
    }

    fn max_priority(&self) -> Result<f64, StoreError> {
        Ok(db::max_priority(&self.conn)?)
    }

    fn select_weighted(&self, min_roll: f64) -> Result<Option<Activity>, StoreError> {
        Ok(db::select_weighted(&self.conn, min_roll)?)
    }
}

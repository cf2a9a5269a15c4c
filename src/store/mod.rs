//! Activity stores.
//!
//! Both the local mirror and the remote store implement [`ActivityStore`].
//! Priority arithmetic lives with the caller; stores only persist values.

use std::error::Error;
use std::fmt;

use rusqlite::ErrorCode;
use serde::Serialize;

use crate::domain::activity::Activity;
use crate::domain::queue::ParseQueueOperationError;

mod local;
mod remote;

pub use local::LocalStore;
pub use remote::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Local,
    Remote,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Local => "local",
            StoreKind::Remote => "remote",
        }
    }
}

pub trait ActivityStore {
    fn kind(&self) -> StoreKind;

    fn list_all(&self) -> Result<Vec<Activity>, StoreError>;

    fn get(&self, name: &str) -> Result<Option<Activity>, StoreError>;

    /// Fails with [`StoreError::DuplicateName`] when `name` already exists.
    fn add(&self, name: &str, priority: f64) -> Result<(), StoreError>;

    /// Returns `true` when a row was removed.
    fn delete(&self, name: &str) -> Result<bool, StoreError>;

    /// Fails with [`StoreError::NotFound`] when `name` does not exist.
    fn set_priority(&self, name: &str, priority: f64) -> Result<(), StoreError>;

    /// Highest stored priority, `0.0` when empty.
    fn max_priority(&self) -> Result<f64, StoreError>;

    /// A uniformly random activity with `priority >= min_roll`.
    fn select_weighted(&self, min_roll: f64) -> Result<Option<Activity>, StoreError>;
}

#[derive(Debug)]
pub enum StoreError {
    DuplicateName(String),
    NotFound(String),
    InvalidQueueEntry {
        id: i64,
        activity: String,
        source: ParseQueueOperationError,
    },
    Db(rusqlite::Error),
}

impl StoreError {
    /// Maps an insert failure onto [`StoreError::DuplicateName`] using the
    /// SQLite extended result code rather than the message text.
    pub(crate) fn from_insert(err: rusqlite::Error, name: &str) -> Self {
        if is_unique_violation(&err) {
            StoreError::DuplicateName(name.to_string())
        } else {
            StoreError::Db(err)
        }
    }

    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, StoreError::DuplicateName(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(inner, _) => {
            inner.code == ErrorCode::ConstraintViolation
                && matches!(
                    inner.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                )
        }
        _ => false,
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateName(name) => write!(f, "activity '{}' already exists", name),
            StoreError::NotFound(name) => write!(f, "activity '{}' not found", name),
            StoreError::InvalidQueueEntry {
                id,
                activity,
                source,
            } => write!(
                f,
                "queue entry {} for '{}' is unreadable: {}",
                id, activity, source
            ),
            StoreError::Db(err) => write!(f, "database error: {}", err),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::DuplicateName(_) => None,
            StoreError::NotFound(_) => None,
            StoreError::InvalidQueueEntry { source, .. } => Some(source),
            StoreError::Db(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        StoreError::Db(value)
    }
}

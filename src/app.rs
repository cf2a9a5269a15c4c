use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::config::{ConfigError, Settings};
use crate::connectivity::{ConnectivityRouter, RemoteConnector, SqliteRemoteConnector};
use crate::domain::activity::{normalize_name, validate_priority, Activity, InvalidActivity};
use crate::domain::queue::PendingEntry;
use crate::locks::{sync_lock_path, FileLock};
use crate::service::{ActivityService, Suggestion};
use crate::store::{RemoteStore, StoreError, StoreKind};
use crate::sync::{SyncError, SyncReport, SyncService};

pub struct App {
    router: ConnectivityRouter,
    settings: Settings,
    local_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectivityReport {
    pub online: bool,
    pub status: String,
    pub active_store: StoreKind,
    pub local: String,
    pub pending_operations: u64,
    pub remote: Option<String>,
    pub last_synced_at: Option<String>,
}

impl App {
    pub fn open(db_path: &str, settings: Settings) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        let connector = settings.remote.as_ref().map(|remote| {
            Box::new(SqliteRemoteConnector::new(
                remote.database_path(),
                remote.busy_timeout,
            )) as Box<dyn RemoteConnector>
        });
        let router = ConnectivityRouter::new(db_path, connector, settings.probe_interval);
        Ok(Self {
            router,
            settings,
            local_path: PathBuf::from(db_path),
        })
    }

    pub fn list_all(&mut self) -> Result<Vec<Activity>, AppError> {
        let store = self.router.active_store()?;
        Ok(ActivityService::new(store).list_all()?)
    }

    pub fn get(&mut self, name: &str) -> Result<Option<Activity>, AppError> {
        let name = normalize_name(name)?;
        let store = self.router.active_store()?;
        Ok(ActivityService::new(store).get(&name)?)
    }

    pub fn suggest(&mut self) -> Result<Option<Suggestion>, AppError> {
        let store = self.router.active_store()?;
        Ok(ActivityService::new(store).suggest()?)
    }

    pub fn add(&mut self, name: &str, priority: f64) -> Result<Activity, AppError> {
        let name = normalize_name(name)?;
        let priority = validate_priority(priority)?;
        let store = self.router.active_store()?;
        ActivityService::new(store).add(&name, priority)?;
        Ok(Activity::new(name, priority))
    }

    pub fn delete(&mut self, name: &str) -> Result<bool, AppError> {
        let name = normalize_name(name)?;
        let store = self.router.active_store()?;
        Ok(ActivityService::new(store).delete(&name)?)
    }

    pub fn adjust_priority(&mut self, name: &str, delta: f64) -> Result<f64, AppError> {
        let name = normalize_name(name)?;
        if !delta.is_finite() {
            return Err(AppError::InvalidArgument(format!(
                "priority delta must be a finite number, got {}",
                delta
            )));
        }
        let store = self.router.active_store()?;
        Ok(ActivityService::new(store).adjust_priority(&name, delta)?)
    }

    pub fn connectivity_status(&mut self) -> Result<ConnectivityReport, AppError> {
        let online = self.router.status().online;
        let active_store = self.router.active_store()?.kind();
        let local = self.router.local()?;
        let pending_operations = local.pending_count()?;
        let last_synced_at = local.last_synced_at()?;
        Ok(ConnectivityReport {
            online,
            status: if online { "online" } else { "offline" }.to_string(),
            active_store,
            local: self.local_path.display().to_string(),
            pending_operations,
            remote: self.remote_path().map(|path| path.display().to_string()),
            last_synced_at,
        })
    }

    pub fn pending_queue(&mut self) -> Result<Vec<PendingEntry>, AppError> {
        Ok(self.router.local()?.pending_entries()?)
    }

    /// Drops one queued operation without replaying it.
    pub fn discard_queue_entry(&mut self, id: i64) -> Result<(), AppError> {
        if !self.router.local()?.remove_queue_entry(id)? {
            return Err(AppError::InvalidArgument(format!(
                "no queued operation with id {}",
                id
            )));
        }
        info!(id, "discarded queued operation");
        Ok(())
    }

    /// Pushes queued local mutations to the remote store and then refreshes
    /// the local mirror. Fails with [`AppError::Offline`] when the remote
    /// store cannot be reached. A pass with failed entries still returns its
    /// report; see [`ensure_complete`].
    pub fn trigger_sync(&mut self) -> Result<SyncReport, AppError> {
        let _span = info_span!("sync", run = %Uuid::now_v7()).entered();
        if !self.router.probe() {
            return Err(self.offline_error()?);
        }

        let lock = FileLock::acquire(
            &sync_lock_path(self.local_path()),
            self.settings.sync.lock_timeout,
        )
        .map_err(SyncError::from)?;
        debug!(lock = %lock.path().display(), "acquired sync lock");
        let policy = self.settings.sync.policy;
        let (remote, local) = self.router.sync_parts()?;
        let Some(remote) = remote else {
            return Err(AppError::Offline {
                pending_operations: local.pending_count()?,
            });
        };
        let report = SyncService::new(remote, local)
            .with_policy(policy)
            .full_sync()?;
        drop(lock);
        Ok(report)
    }

    /// Creates the remote database and schema at the configured location.
    pub fn init_remote(&mut self) -> Result<PathBuf, AppError> {
        let remote = self.settings.remote.as_ref().ok_or_else(|| {
            AppError::Config(ConfigError::Invalid(
                "no remote host configured; set --remote-host or [remote].host".to_string(),
            ))
        })?;
        let path = remote.database_path();
        RemoteStore::initialize(&path, remote.busy_timeout)?;
        info!(path = %path.display(), "initialized remote store");
        self.router.probe();
        Ok(path)
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_path(&self) -> Option<PathBuf> {
        self.settings
            .remote
            .as_ref()
            .map(|remote| remote.database_path())
    }

    fn offline_error(&mut self) -> Result<AppError, AppError> {
        let pending_operations = self.router.local()?.pending_count()?;
        Ok(AppError::Offline { pending_operations })
    }
}

/// Turns a report with failed entries into [`AppError::SyncIncomplete`].
pub fn ensure_complete(report: &SyncReport) -> Result<(), AppError> {
    if report.has_failures() {
        return Err(AppError::SyncIncomplete {
            failed: report.failed,
        });
    }
    Ok(())
}

fn ensure_parent_dir(path: &str) -> Result<(), AppError> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Store(StoreError),
    Sync(SyncError),
    Config(ConfigError),
    InvalidArgument(String),
    NotFound(String),
    Offline { pending_operations: u64 },
    SyncIncomplete { failed: u64 },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Store(err) => write!(f, "{}", err),
            AppError::Sync(err) => write!(f, "sync error: {}", err),
            AppError::Config(err) => write!(f, "{}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::NotFound(name) => write!(f, "activity '{}' not found", name),
            AppError::Offline { pending_operations } => write!(
                f,
                "remote store is unreachable; {} pending operation(s) stay queued",
                pending_operations
            ),
            AppError::SyncIncomplete { failed } => {
                write!(f, "sync left {} failed operation(s) queued", failed)
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Sync(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::InvalidArgument(_) => None,
            AppError::NotFound(_) => None,
            AppError::Offline { .. } => None,
            AppError::SyncIncomplete { .. } => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(name) => AppError::NotFound(name),
            other => AppError::Store(other),
        }
    }
}

impl From<SyncError> for AppError {
    fn from(value: SyncError) -> Self {
        AppError::Sync(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<InvalidActivity> for AppError {
    fn from(value: InvalidActivity) -> Self {
        AppError::InvalidArgument(value.to_string())
    }
}

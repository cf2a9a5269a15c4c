//! Decides, per call, which store is authoritative.
//!
//! The router caches the outcome of the last remote probe for
//! `probe_interval`. While the cached result is fresh no probe runs, so an
//! offline client pays the connection cost at most once per interval.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::store::{ActivityStore, LocalStore, RemoteStore, StoreError};

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Opens handles to the remote store.
pub trait RemoteConnector {
    fn describe(&self) -> String;

    fn connect(&self) -> Result<RemoteStore, StoreError>;
}

#[derive(Debug, Clone)]
pub struct SqliteRemoteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteRemoteConnector {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }
}

impl RemoteConnector for SqliteRemoteConnector {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn connect(&self) -> Result<RemoteStore, StoreError> {
        RemoteStore::connect(&self.path, self.busy_timeout)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    pub online: bool,
    pub last_checked_at: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectivityStatus {
    pub online: bool,
}

pub struct ConnectivityRouter {
    connector: Option<Box<dyn RemoteConnector>>,
    local_path: String,
    probe_interval: Duration,
    state: ConnectivityState,
    remote: Option<RemoteStore>,
    local: Option<LocalStore>,
}

impl ConnectivityRouter {
    /// `connector` is `None` when no remote store is configured; the router
    /// then always routes to the local store.
    pub fn new(
        local_path: impl Into<String>,
        connector: Option<Box<dyn RemoteConnector>>,
        probe_interval: Duration,
    ) -> Self {
        Self {
            connector,
            local_path: local_path.into(),
            probe_interval,
            state: ConnectivityState::default(),
            remote: None,
            local: None,
        }
    }

    /// Reconnects to the remote store and replaces the cached handle. An
    /// open handle can outlive the file it points at, so it is never reused
    /// across probes. Failures only flip the cached state to offline; they
    /// are logged and never returned.
    pub fn probe(&mut self) -> bool {
        let connected = match self.connector.as_ref() {
            Some(connector) => match connector.connect() {
                Ok(remote) => Some(remote),
                Err(err) => {
                    debug!(remote = %connector.describe(), error = %err, "remote store unreachable");
                    None
                }
            },
            None => None,
        };
        let online = connected.is_some();
        self.remote = connected;

        if online != self.state.online {
            if let Some(remote) = self.remote.as_ref() {
                info!(remote = %remote.path().display(), "remote store is reachable");
            } else if self.state.last_checked_at.is_some() {
                info!("remote store became unreachable; routing to local store");
            }
        }
        self.state = ConnectivityState {
            online,
            last_checked_at: Some(Instant::now()),
        };
        online
    }

    pub fn is_stale(&self) -> bool {
        self.state
            .last_checked_at
            .map_or(true, |checked| checked.elapsed() >= self.probe_interval)
    }

    fn refresh_if_stale(&mut self) {
        if self.is_stale() {
            self.probe();
        }
    }

    /// The store every read and write should go to right now.
    pub fn active_store(&mut self) -> Result<&dyn ActivityStore, StoreError> {
        self.refresh_if_stale();
        if self.state.online {
            if let Some(remote) = self.remote.as_ref() {
                let store: &dyn ActivityStore = remote;
                return Ok(store);
            }
        }
        let local: &dyn ActivityStore = open_local_slot(&mut self.local, &self.local_path)?;
        Ok(local)
    }

    pub fn status(&mut self) -> ConnectivityStatus {
        self.refresh_if_stale();
        ConnectivityStatus {
            online: self.state.online,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn local(&mut self) -> Result<&LocalStore, StoreError> {
        open_local_slot(&mut self.local, &self.local_path)
    }

    #[cfg(test)]
    pub fn remote(&self) -> Option<&RemoteStore> {
        self.remote.as_ref()
    }

    /// Both stores at once, for reconciliation. The remote handle is `None`
    /// while offline.
    pub fn sync_parts(&mut self) -> Result<(Option<&RemoteStore>, &LocalStore), StoreError> {
        let local = open_local_slot(&mut self.local, &self.local_path)?;
        Ok((self.remote.as_ref(), local))
    }
}

fn open_local_slot<'a>(
    slot: &'a mut Option<LocalStore>,
    path: &str,
) -> Result<&'a LocalStore, StoreError> {
    let store = match slot.take() {
        Some(store) => store,
        None => {
            debug!(path, "opening local store");
            LocalStore::open(path)?
        }
    };
    let store: &LocalStore = slot.insert(store);
    Ok(store)
}

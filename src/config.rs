use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::connectivity::DEFAULT_PROBE_INTERVAL;
use crate::sync::SyncPolicy;

pub const DEFAULT_REMOTE_DATABASE: &str = "activities";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfigFile {
    #[serde(default)]
    remote: RawRemote,
    #[serde(default)]
    connectivity: RawConnectivity,
    #[serde(default)]
    sync: RawSync,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemote {
    host: Option<String>,
    database: Option<String>,
    busy_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConnectivity {
    probe_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSync {
    pull_after_failed_push: Option<bool>,
    lock_timeout_ms: Option<u64>,
}

/// Values supplied on the command line or through the environment. They win
/// over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub remote_host: Option<String>,
    pub remote_database: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub host: PathBuf,
    pub database: String,
    pub busy_timeout: Duration,
}

impl RemoteSettings {
    pub fn database_path(&self) -> PathBuf {
        self.host.join(format!("{}.sqlite", self.database))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub policy: SyncPolicy,
    pub lock_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `None` when no remote host is configured; the client is then always
    /// offline.
    pub remote: Option<RemoteSettings>,
    pub probe_interval: Duration,
    pub sync: SyncSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote: None,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            sync: SyncSettings {
                policy: SyncPolicy::default(),
                lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            },
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}

impl Settings {
    /// Loads settings from `explicit` when given, else from the default
    /// location. Only the default location may be absent.
    pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let raw = match explicit {
            Some(path) => read_config(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_config(&path)?,
                _ => String::new(),
            },
        };
        Self::from_toml(&raw, overrides)
    }

    pub(crate) fn from_toml(raw: &str, overrides: &Overrides) -> Result<Self, ConfigError> {
        let file: RawConfigFile = toml::from_str(raw)?;
        let defaults = Settings::default();

        let host = overrides
            .remote_host
            .as_deref()
            .or(file.remote.host.as_deref())
            .and_then(normalize_scalar);
        let database = overrides
            .remote_database
            .as_deref()
            .or(file.remote.database.as_deref())
            .and_then(normalize_scalar)
            .unwrap_or_else(|| DEFAULT_REMOTE_DATABASE.to_string());
        if database.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "remote database name '{}' must not contain path separators",
                database
            )));
        }
        let remote = host.map(|host| RemoteSettings {
            host: PathBuf::from(host),
            database,
            busy_timeout: Duration::from_millis(
                file.remote.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            ),
        });

        let probe_interval = file
            .connectivity
            .probe_interval_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.probe_interval);

        let sync = SyncSettings {
            policy: SyncPolicy {
                pull_after_failed_push: file
                    .sync
                    .pull_after_failed_push
                    .unwrap_or(defaults.sync.policy.pull_after_failed_push),
            },
            lock_timeout: file
                .sync
                .lock_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.sync.lock_timeout),
        };

        Ok(Self {
            remote,
            probe_interval,
            sync,
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("actgen")
            .join("config.toml"),
    )
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn normalize_scalar(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use uuid::Uuid;

    use super::{ConfigError, Overrides, Settings, DEFAULT_REMOTE_DATABASE};

    #[test]
    fn empty_config_yields_offline_defaults() {
        let settings =
            Settings::from_toml("", &Overrides::default()).expect("empty config should parse");
        assert_eq!(settings, Settings::default());
        assert!(settings.remote.is_none());
        assert_eq!(settings.probe_interval, Duration::from_secs(5));
        assert!(settings.sync.policy.pull_after_failed_push);
    }

    #[test]
    fn file_values_are_applied() {
        let raw = r#"
[remote]
host = "/mnt/shared/actgen"
database = "team"
busy_timeout_ms = 250

[connectivity]
probe_interval_secs = 30

[sync]
pull_after_failed_push = false
lock_timeout_ms = 100
"#;
        let settings =
            Settings::from_toml(raw, &Overrides::default()).expect("config should parse");
        let remote = settings.remote.expect("remote should be configured");
        assert_eq!(
            remote.database_path(),
            PathBuf::from("/mnt/shared/actgen/team.sqlite")
        );
        assert_eq!(remote.busy_timeout, Duration::from_millis(250));
        assert_eq!(settings.probe_interval, Duration::from_secs(30));
        assert!(!settings.sync.policy.pull_after_failed_push);
        assert_eq!(settings.sync.lock_timeout, Duration::from_millis(100));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let raw = "[remote]\nhost = \"/from/file\"\ndatabase = \"file-db\"\n";
        let overrides = Overrides {
            remote_host: Some("/from/flag".to_string()),
            remote_database: None,
        };
        let settings = Settings::from_toml(raw, &overrides).expect("config should parse");
        let remote = settings.remote.expect("remote should be configured");
        assert_eq!(remote.host, PathBuf::from("/from/flag"));
        assert_eq!(remote.database, "file-db");
    }

    #[test]
    fn database_defaults_when_only_host_is_given() {
        let overrides = Overrides {
            remote_host: Some("/srv/share".to_string()),
            remote_database: Some("  ".to_string()),
        };
        let settings = Settings::from_toml("", &overrides).expect("config should parse");
        assert_eq!(
            settings.remote.expect("remote should be configured").database,
            DEFAULT_REMOTE_DATABASE
        );
    }

    #[test]
    fn rejects_unknown_keys_and_bad_database_names() {
        let unknown = Settings::from_toml("[remote]\nport = 3306\n", &Overrides::default())
            .expect_err("unknown key should fail");
        assert!(matches!(unknown, ConfigError::Toml(_)));

        let overrides = Overrides {
            remote_host: Some("/srv".to_string()),
            remote_database: Some("../escape".to_string()),
        };
        let invalid = Settings::from_toml("", &overrides).expect_err("separator should fail");
        assert!(invalid.to_string().contains("path separators"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("actgen-config-{}.toml", Uuid::now_v7()));
        let err = Settings::load(Some(&path), &Overrides::default())
            .expect_err("missing explicit config should fail");
        assert!(matches!(err, ConfigError::Io { .. }));

        std::fs::write(&path, "[connectivity]\nprobe_interval_secs = 1\n")
            .expect("config should be writable");
        let settings =
            Settings::load(Some(&path), &Overrides::default()).expect("config should load");
        assert_eq!(settings.probe_interval, Duration::from_secs(1));
        let _ = std::fs::remove_file(path);
    }
}

//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, str::FromStr};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "COURTSIDE_CONFIG_PATH";
/// Environment variable that overrides the configured storage backend.
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";

const DEFAULT_HISTORY_LIMIT: usize = 10;
const DEFAULT_UPDATE_RETRIES: u32 = 3;

/// Persistence backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local store, lost on restart.
    #[default]
    Memory,
    /// MongoDB, configured through `MONGO_URI` / `MONGO_DB`.
    Mongo,
    /// CouchDB, configured through the `COUCH_*` variables.
    Couch,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "mongo" | "mongodb" => Ok(Self::Mongo),
            "couch" | "couchdb" => Ok(Self::Couch),
            other => Err(format!("unknown storage backend `{other}`")),
        }
    }
}

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Backend the storage supervisor connects to.
    pub storage: StorageBackend,
    /// Number of entries returned by history listings.
    pub history_limit: usize,
    /// How many times a point update is replayed after a version conflict.
    pub update_retries: u32,
}

impl AppConfig {
    /// Load the configuration from disk and the environment, falling back to defaults.
    pub fn load() -> Self {
        let mut config = Self::from_file();

        if let Ok(raw) = env::var(STORAGE_BACKEND_ENV) {
            match raw.parse() {
                Ok(storage) => config.storage = storage,
                Err(err) => warn!(error = %err, "ignoring {STORAGE_BACKEND_ENV}"),
            }
        }

        info!(
            storage = ?config.storage,
            history_limit = config.history_limit,
            update_retries = config.update_retries,
            "configuration loaded"
        );
        config
    }

    fn from_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded config file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackend::default(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            update_retries: DEFAULT_UPDATE_RETRIES,
        }
    }
}

/// JSON representation of the configuration file; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    storage: Option<StorageBackend>,
    history_limit: Option<usize>,
    update_retries: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            storage: value.storage.unwrap_or(defaults.storage),
            history_limit: match value.history_limit {
                Some(0) => {
                    warn!("`history_limit` must be positive; using {}", defaults.history_limit);
                    defaults.history_limit
                }
                limit => limit.unwrap_or(defaults.history_limit),
            },
            update_retries: value.update_retries.unwrap_or(defaults.update_retries),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

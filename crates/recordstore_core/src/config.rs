//! Store configuration.
//!
//! # Responsibility
//! - Describe where a store keeps its persistent file and how it waits on locks.
//! - Derive a default configuration from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the directory for default store files.
pub const DATA_DIR_ENV: &str = "RECORDSTORE_DATA_DIR";

const STORE_FILE_EXTENSION: &str = "sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    /// Nothing is persisted beyond the store lifetime.
    InMemory,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub location: StoreLocation,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::InMemory,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            location: StoreLocation::File(path.as_ref().to_path_buf()),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Default file configuration for `model_name`.
    ///
    /// The file lives in `$RECORDSTORE_DATA_DIR`, or in a `recordstore`
    /// directory under the OS temp dir when the variable is unset or empty.
    pub fn from_env(model_name: &str) -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("recordstore"));
        Self::file(data_dir.join(format!("{model_name}.{STORE_FILE_EXTENSION}")))
    }
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::{StoreConfig, StoreLocation};
    use std::path::PathBuf;

    #[test]
    fn config_parses_with_default_timeout() {
        let config: StoreConfig =
            serde_json::from_str(r#"{"location": {"file": "/var/data/todo.sqlite3"}}"#)
                .expect("config should parse");
        assert_eq!(
            config.location,
            StoreLocation::File(PathBuf::from("/var/data/todo.sqlite3"))
        );
        assert_eq!(config.busy_timeout_ms, 5_000);

        let memory: StoreConfig =
            serde_json::from_str(r#"{"location": "in_memory", "busy_timeout_ms": 10}"#).unwrap();
        assert_eq!(memory.location, StoreLocation::InMemory);
        assert_eq!(memory.busy_timeout_ms, 10);
    }

    #[test]
    fn env_config_names_file_after_model() {
        let config = StoreConfig::from_env("Todo");
        match config.location {
            StoreLocation::File(path) => {
                assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("Todo.sqlite3"))
            }
            StoreLocation::InMemory => panic!("env config must be file based"),
        }
    }
}

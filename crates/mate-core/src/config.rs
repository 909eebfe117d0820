//! Configuration for the TaskMate assistant.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub web: WebConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file the task store rewrites on every mutation.
    #[serde(default = "default_tasks_path")]
    pub tasks_path: PathBuf,
    /// SQLite file holding per-thread conversation checkpoints.
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_tasks_path() -> PathBuf {
    PathBuf::from("data/tasks.json")
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("data/checkpoints.sqlite")
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tasks_path: default_tasks_path(),
            checkpoint_path: default_checkpoint_path(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

pub fn parse_app_config(body: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(body)
}

pub fn load_app_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path_ref = path.as_ref();
    let body = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    parse_app_config(&body).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use folio_engine::{AnswerSettings, DocumentSettings, EngineSettings, DEFAULT_ENDPOINT};
use folio_core::DEFAULT_SCALE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "folio.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("could not parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
}

/// Destination for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogDestination {
    /// Write to ./folio.log in current directory.
    File,
    /// Write to terminal (stderr for warnings and errors).
    Terminal,
    /// Write to both file and terminal.
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub destination: LogDestination,
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogDestination::File,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: String,
    pub storage_dir: PathBuf,
    pub render_scale: f64,
    pub connect_timeout_secs: u64,
    pub max_document_bytes: u64,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            storage_dir: PathBuf::from(".folio"),
            render_scale: DEFAULT_SCALE,
            connect_timeout_secs: 10,
            max_document_bytes: DocumentSettings::default().max_bytes,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads the config file; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        let connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        EngineSettings {
            answer: AnswerSettings {
                endpoint: self.endpoint.clone(),
                connect_timeout,
            },
            document: DocumentSettings {
                connect_timeout,
                max_bytes: self.max_document_bytes,
                ..DocumentSettings::default()
            },
        }
    }
}

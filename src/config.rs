//! Server configuration.
//!
//! Loaded from an optional YAML file (path in `LANTERN_CONFIG`), with the
//! `LISTEN` environment variable overriding the listen address.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Environment variable naming the YAML configuration file.
pub const CONFIG_ENV: &str = "LANTERN_CONFIG";

/// Environment variable overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

/// Shortest request the server can ever accept: `GET /x\r\n\r\n`.
const MIN_REQUEST_SIZE: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub log: LogConfig,
}

/// Listener, admission and timeout settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:8080`
    pub listen_addr: String,
    /// Pending-connection backlog passed to `listen(2)`
    pub backlog: u32,
    /// Maximum number of concurrently running connection workers
    pub max_workers: usize,
    /// Upper bound on the request head, terminator included
    pub max_request_size: usize,
    pub read_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
    /// How long shutdown waits for in-flight workers before aborting them
    pub drain_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory files are served from
    pub root: PathBuf,
    /// Size of each body chunk read from disk and written to the socket
    pub chunk_size: usize,
    /// Content type used when the extension is unknown
    pub default_content_type: String,
    /// Extra or overriding extension -> content type entries
    pub content_types: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Append-only access log
    pub path: PathBuf,
}

/// Reasons a configuration is rejected before the server starts.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("backlog must be at least 10, got {0}")]
    BacklogTooSmall(u32),

    #[error("max_workers must be greater than zero")]
    NoWorkers,

    #[error("max_request_size must be at least 10, got {0}")]
    RequestSizeTooSmall(usize),

    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            backlog: 10,
            max_workers: 64,
            max_request_size: 1024,
            read_timeout_secs: None,
            write_timeout_secs: None,
            drain_timeout_secs: 5,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            chunk_size: 1024,
            default_content_type: "text/html".to_string(),
            content_types: HashMap::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("server_thread.txt"),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_secs.map(Duration::from_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Config {
    /// Loads the configuration for this process.
    ///
    /// Reads the YAML file named by `LANTERN_CONFIG` when it is set, falls back
    /// to defaults otherwise, then applies the `LISTEN` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var(LISTEN_ENV) {
            cfg.server.listen_addr = listen_addr;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        // An empty document deserializes to unit, not to a mapping.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.backlog < 10 {
            return Err(ConfigError::BacklogTooSmall(self.server.backlog));
        }
        if self.server.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.server.max_request_size < MIN_REQUEST_SIZE {
            return Err(ConfigError::RequestSizeTooSmall(self.server.max_request_size));
        }
        if self.static_files.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(())
    }
}

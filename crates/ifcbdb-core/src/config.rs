//! Configuration module for the IFCB dashboard tooling.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::directory::{DEFAULT_BLACKLIST, DEFAULT_WHITELIST};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
///
/// Every section is optional in the file; missing sections and fields take
/// their default values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub scanner: ScannerConfig,
    pub logging: LoggingConfig,
}

/// Persisted store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Seconds a writer waits on a locked database.
    pub busy_timeout_secs: u64,
}

/// Shared cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache backend: `sqlite` (shared between processes) or `memory`.
    pub backend: String,
    /// Seconds a dataset to task mapping is kept.
    pub task_handle_ttl_secs: u64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Bins written per store transaction.
    pub batch_size: usize,
    /// Seconds after which a sync lock expires on its own. `None` means the
    /// lock lives until released.
    pub lock_ttl_secs: Option<u64>,
    /// Milliseconds between status polls while waiting for a sync.
    pub poll_interval_ms: u64,
}

/// Directory scanner defaults applied to new data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Comma-separated whitelist for new directories.
    pub default_whitelist: String,
    /// Comma-separated blacklist for new directories.
    pub default_blacklist: String,
    /// Follow symbolic links while walking.
    pub follow_links: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `human` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/ifcbdb/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ifcbdb")
            .join("config.yaml")
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl SyncConfig {
    pub fn lock_ttl(&self) -> Option<Duration> {
        self.lock_ttl_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl CacheConfig {
    pub fn task_handle_ttl(&self) -> Duration {
        Duration::from_secs(self.task_handle_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("ifcbdb")
                .join("ifcbdb.db"),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            task_handle_ttl_secs: 3600,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            lock_ttl_secs: None,
            poll_interval_ms: 500,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            default_whitelist: DEFAULT_WHITELIST.to_string(),
            default_blacklist: DEFAULT_BLACKLIST.to_string(),
            follow_links: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "human".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.batch_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["human", "json"];

/// Valid values for `cache.backend`.
const VALID_CACHE_BACKENDS: &[&str] = &["sqlite", "memory"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- database ---
        if self.database.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }
        if self.database.max_connections == 0 {
            errors.push(ValidationError {
                field: "database.max_connections".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- cache ---
        if !VALID_CACHE_BACKENDS.contains(&self.cache.backend.as_str()) {
            errors.push(ValidationError {
                field: "cache.backend".into(),
                message: format!(
                    "invalid backend '{}'; valid options: {}",
                    self.cache.backend,
                    VALID_CACHE_BACKENDS.join(", ")
                ),
            });
        }
        if self.cache.task_handle_ttl_secs == 0 {
            errors.push(ValidationError {
                field: "cache.task_handle_ttl_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- sync ---
        if self.sync.batch_size == 0 {
            errors.push(ValidationError {
                field: "sync.batch_size".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.sync.lock_ttl_secs == Some(0) {
            errors.push(ValidationError {
                field: "sync.lock_ttl_secs".into(),
                message: "must be greater than 0 when set".into(),
            });
        }
        if self.sync.poll_interval_ms == 0 {
            errors.push(ValidationError {
                field: "sync.poll_interval_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] or a loaded [`Config`] and allows
/// selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use ifcbdb_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .database_path(PathBuf::from("/var/lib/ifcbdb/ifcbdb.db"))
///     .sync_batch_size(1000)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration, e.g. one loaded from disk.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    pub fn database_max_connections(mut self, n: u32) -> Self {
        self.config.database.max_connections = n;
        self
    }

    // --- cache ---

    pub fn cache_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.cache.backend = backend.into();
        self
    }

    pub fn cache_task_handle_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache.task_handle_ttl_secs = secs;
        self
    }

    // --- sync ---

    pub fn sync_batch_size(mut self, n: usize) -> Self {
        self.config.sync.batch_size = n;
        self
    }

    pub fn sync_lock_ttl_secs(mut self, secs: Option<u64>) -> Self {
        self.config.sync.lock_ttl_secs = secs;
        self
    }

    pub fn sync_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.sync.poll_interval_ms = ms;
        self
    }

    // --- scanner ---

    pub fn scanner_default_whitelist(mut self, list: impl Into<String>) -> Self {
        self.config.scanner.default_whitelist = list.into();
        self
    }

    pub fn scanner_default_blacklist(mut self, list: impl Into<String>) -> Self {
        self.config.scanner.default_blacklist = list.into();
        self
    }

    pub fn scanner_follow_links(mut self, follow: bool) -> Self {
        self.config.scanner.follow_links = follow;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//! Configuration loading for search-sync.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/search-sync/config.toml.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::SyncError;
use crate::index::IndexDeclaration;

/// Default number of documents dispatched per index per pass.
pub const DEFAULT_BATCH_LIMIT: usize = 100;

/// Remote search service credentials and transport settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
    /// Prefix prepended to every index key to form the remote index name
    #[serde(default)]
    pub db_prefix: Option<String>,

    /// Application id of the remote service
    #[serde(default)]
    pub app_id: Option<String>,

    /// Search-only key, handed to front ends; never used for writes
    #[serde(default)]
    pub api_key_front: Option<String>,

    /// Write key used by the sync engine
    #[serde(default)]
    pub api_key_admin: Option<String>,

    /// Override for the service base URL (tests, proxies)
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            db_prefix: None,
            app_id: None,
            api_key_front: None,
            api_key_admin: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl RemoteSettings {
    /// Check that remote calls can proceed.
    ///
    /// `db_prefix` may be empty but must be set explicitly.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.app_id.as_deref().map_or(true, str::is_empty) {
            return Err(SyncError::Config("remote.app_id is not set".to_string()));
        }
        if self.api_key_admin.as_deref().map_or(true, str::is_empty) {
            return Err(SyncError::Config(
                "remote.api_key_admin is not set".to_string(),
            ));
        }
        if self.db_prefix.is_none() {
            return Err(SyncError::Config("remote.db_prefix is not set".to_string()));
        }
        Ok(())
    }

    /// The configured prefix, or an error when unset.
    pub fn index_prefix(&self) -> Result<&str, SyncError> {
        self.db_prefix
            .as_deref()
            .ok_or_else(|| SyncError::Config("remote.db_prefix is not set".to_string()))
    }
}

/// Where content items are read from.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentSettings {
    /// Path to the SQLite content database
    #[serde(default)]
    pub db_path: Option<String>,

    /// Table prefix of the content schema
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

fn default_table_prefix() -> String {
    "wp_".to_string()
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            db_path: None,
            table_prefix: default_table_prefix(),
        }
    }
}

/// Schedules for the periodic entry points.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    /// Cron expression for reindexing (6-field, seconds first)
    #[serde(default = "default_reindex_cron")]
    pub reindex_cron: String,

    /// Cron expression for purging
    #[serde(default = "default_purge_cron")]
    pub purge_cron: String,

    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Max random delay before each run
    #[serde(default)]
    pub jitter_secs: u64,

    /// Per-run timeout, 0 disables it
    #[serde(default = "default_job_timeout")]
    pub timeout_secs: u64,
}

fn default_reindex_cron() -> String {
    "0 */5 * * * *".to_string()
}

fn default_purge_cron() -> String {
    "30 */5 * * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_job_timeout() -> u64 {
    300
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            reindex_cron: default_reindex_cron(),
            purge_cron: default_purge_cron(),
            timezone: default_timezone(),
            jitter_secs: 0,
            timeout_secs: default_job_timeout(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Path to the RocksDB tracking store
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Max documents dispatched per index per pass
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    #[serde(default)]
    pub content: ContentSettings,

    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub schedule: ScheduleSettings,

    /// Index declarations keyed by index name.
    ///
    /// Read straight from the TOML config files so index names and
    /// settings keys keep their case.
    #[serde(skip)]
    pub indexes: BTreeMap<String, IndexDeclaration>,

    /// How long to wait for another process holding the tracking store
    #[serde(default = "default_lock_wait_secs")]
    pub lock_wait_secs: u64,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "search-sync")
        .map(|p| p.data_local_dir().join("tracking"))
        .unwrap_or_else(|| PathBuf::from("./tracking"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

fn default_lock_wait_secs() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
            batch_limit: default_batch_limit(),
            content: ContentSettings::default(),
            remote: RemoteSettings::default(),
            schedule: ScheduleSettings::default(),
            indexes: BTreeMap::new(),
            lock_wait_secs: default_lock_wait_secs(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/search-sync/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (SEARCHSYNC_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SyncError> {
        let config_dir = ProjectDirs::from("", "", "search-sync")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");
        let mut index_files = Vec::new();
        let default_toml = config_dir.join("config.toml");
        if default_toml.is_file() {
            index_files.push(default_toml);
        }

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| SyncError::Config(e.to_string()))?
            .set_default("batch_limit", DEFAULT_BATCH_LIMIT as i64)
            .map_err(|e| SyncError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
            if let Some(file) = resolve_config_file(path) {
                index_files.push(file);
            }
        }

        // SEARCHSYNC_BATCH_LIMIT, SEARCHSYNC_REMOTE__APP_ID, ...
        builder = builder.add_source(
            Environment::with_prefix("SEARCHSYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        let mut settings: Settings = config
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        // The config crate lowercases keys; index tables are read verbatim.
        for file in &index_files {
            settings.indexes.extend(read_index_tables(file)?);
        }

        if settings.batch_limit == 0 {
            return Err(SyncError::Config("batch_limit must be > 0".to_string()));
        }
        Ok(settings)
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }
}

#[derive(Debug, Default, Deserialize)]
struct IndexTables {
    #[serde(default)]
    indexes: BTreeMap<String, IndexDeclaration>,
}

/// The file `File::with_name(path)` reads, when it is TOML.
fn resolve_config_file(path: &str) -> Option<PathBuf> {
    let given = PathBuf::from(path);
    if given.is_file() {
        return match given.extension() {
            Some(ext) if ext != "toml" => None,
            _ => Some(given),
        };
    }
    let with_ext = PathBuf::from(format!("{}.toml", path));
    with_ext.is_file().then_some(with_ext)
}

/// `[indexes.*]` tables of one TOML file, keys untouched.
fn read_index_tables(path: &Path) -> Result<BTreeMap<String, IndexDeclaration>, SyncError> {
    let text = fs::read_to_string(path)
        .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
    let tables: IndexTables = toml::from_str(&text)
        .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
    Ok(tables.indexes)
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

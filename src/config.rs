use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// Top-level config loaded from `mowa.toml`. Returns defaults when the
/// file is absent, following the teacher's `WideConfig::load` pattern.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub sources: Vec<LogSourceConfig>,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    /// `COMPRESSION` — toggles sled's internal zstd compression, which is
    /// the closest analogue to the original's on/off BerkeleyDB
    /// compression flag for C8.
    #[serde(default)]
    pub compression: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            db_name: default_db_name(),
            compression: false,
        }
    }
}

fn default_db_path() -> String {
    "./data".to_string()
}

fn default_db_name() -> String {
    "mowa.db".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// `FILTER_PATH` — log directory scanned for sources not explicitly
    /// listed in `sources`.
    #[serde(default)]
    pub path: String,
    /// `FILTER_SSL` — substring a log file name must contain to be picked
    /// up by the directory scan above.
    #[serde(default)]
    pub ssl: String,
    /// `FILTER_EXTENSION` — group-name -> set of exact extensions, e.g.
    /// `w -> {.do, .html}`. Stored inverted (extension -> group) for O(1)
    /// lookup per parsed line.
    #[serde(default = "default_extension_groups")]
    pub extension_groups: HashMap<String, String>,
    /// `FILTER_URL1..3` — literal substrings used to detect response code.
    #[serde(default = "default_url1")]
    pub url1: String,
    #[serde(default = "default_url2")]
    pub url2: String,
    #[serde(default = "default_url3")]
    pub url3: String,
    /// Enables the reserved type "3" (404) classification. Off by default
    /// per spec.md §4.4 step 4.
    #[serde(default)]
    pub enable_404: bool,
    /// `EXCLUDE_MOD` — apps containing this substring are hidden from
    /// query results and module listings.
    #[serde(default)]
    pub exclude_mod: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            ssl: String::new(),
            extension_groups: default_extension_groups(),
            url1: default_url1(),
            url2: default_url2(),
            url3: default_url3(),
            enable_404: false,
            exclude_mod: String::new(),
        }
    }
}

fn default_extension_groups() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert(".do".to_string(), "w".to_string());
    m.insert(".html".to_string(), "w".to_string());
    m
}

fn default_url1() -> String {
    " 200 ".to_string()
}
fn default_url2() -> String {
    " 302 ".to_string()
}
fn default_url3() -> String {
    " 404 ".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFileFormat {
    /// Substitute today's Unix epoch of local midnight into the path.
    Timestamp,
    /// Substitute today's date as `YYYY-MM-DD` into the path.
    Date,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSourceConfig {
    pub format: LogFileFormat,
    /// `LOG_FILE_PATH.i`, with a `{date}` placeholder substituted per
    /// `format` at each tick.
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// `DAYS_FOR_MINUTES_DETAILS`, default 3.
    #[serde(default = "default_days_minutes")]
    pub days_for_minutes: u32,
    /// `DAYS_FOR_DETAILS` (10-minute), default 7.
    #[serde(default = "default_days_details")]
    pub days_for_details: u32,
    /// `DAYS_FOR_HOURS_DETAILS`, default 31.
    #[serde(default = "default_days_hours")]
    pub days_for_hours: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days_for_minutes: default_days_minutes(),
            days_for_details: default_days_details(),
            days_for_hours: default_days_hours(),
        }
    }
}

fn default_days_minutes() -> u32 {
    3
}
fn default_days_details() -> u32 {
    7
}
fn default_days_hours() -> u32 {
    31
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub listening_port: u16,
    /// `LOGS_READ_INTERVAL`, seconds between tailer ticks.
    #[serde(default = "default_read_interval")]
    pub logs_read_interval_secs: u64,
    /// Directory holding the `mwa.pos.<i>` sidecar offset files.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Forces the C9 worker pool down to a single worker for deterministic
    /// test runs.
    #[serde(default)]
    pub deterministic_workers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listening_port: default_port(),
            logs_read_interval_secs: default_read_interval(),
            state_dir: default_state_dir(),
            deterministic_workers: false,
        }
    }
}

fn default_port() -> u16 {
    8080
}
fn default_read_interval() -> u64 {
    10
}
fn default_state_dir() -> String {
    "./data".to_string()
}

impl AppConfig {
    /// Loads config from a TOML file. Returns defaults if the file doesn't
    /// exist; fatal (propagated) on parse error or an empty extension-group
    /// mapping, per spec.md §7.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config = if !path.exists() {
            tracing::info!(
                "config file not found at {}, using defaults",
                path.display()
            );
            Self::default()
        } else {
            let contents = std::fs::read_to_string(path)?;
            let config: AppConfig = toml::from_str(&contents)?;
            tracing::info!("loaded config from {}", path.display());
            config
        };

        if config.filters.extension_groups.is_empty() {
            anyhow::bail!("no extension->group mapping configured; every request would be dropped by the parser");
        }

        Ok(config)
    }
}

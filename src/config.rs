//! Configuration file handling

use std::{num::NonZeroUsize, path::Path, path::PathBuf, time::Duration};

use eyre::Context;
use serde::{Deserialize, Deserializer};
use tracing::level_filters::LevelFilter;
use usage_stats::{LogKind, Settings, geo};

/// Usage report configuration object
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Config {
    pub report: Settings,
    pub input: InputTable,
    pub geo: GeoTable,
    pub logging: LoggingTable,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct InputTable {
    /// Which variety of log the directory holds
    pub kind: LogKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct GeoTable {
    /// Reverse lookups in flight at once
    pub concurrency: NonZeroUsize,
    /// Seconds a single lookup may take
    pub timeout_secs: u64,
}

impl GeoTable {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GeoTable {
    fn default() -> Self {
        GeoTable {
            concurrency: geo::DEFAULT_CONCURRENCY,
            timeout_secs: geo::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct LoggingTable {
    /// Log verbosity
    #[serde(deserialize_with = "deserialize_level_filter")]
    pub verbosity: LevelFilter,

    /// File to print logs to in addition to the console
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingTable {
    fn default() -> Self {
        LoggingTable {
            verbosity: default_level(),
            log_file: None,
        }
    }
}

// This type exists so serde can figure out what variants are available for the verbosity option.
// tracing's LevelFilter only implements FromStr, which accepts more spellings than we document.
#[derive(Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
enum LevelFilterWrapper {
    Off,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LevelFilterWrapper> for LevelFilter {
    fn from(val: LevelFilterWrapper) -> Self {
        match val {
            LevelFilterWrapper::Off => LevelFilter::OFF,
            LevelFilterWrapper::Trace => LevelFilter::TRACE,
            LevelFilterWrapper::Debug => LevelFilter::DEBUG,
            LevelFilterWrapper::Info => LevelFilter::INFO,
            LevelFilterWrapper::Warn => LevelFilter::WARN,
            LevelFilterWrapper::Error => LevelFilter::ERROR,
        }
    }
}

/// Get default log level.
pub fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

// Deserialize a `LevelFilter` from one of the lowercase level names
fn deserialize_level_filter<'de, D>(deserializer: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    LevelFilterWrapper::deserialize(deserializer).map(LevelFilter::from)
}

impl Config {
    /// Load configuration from the given TOML file.
    pub async fn parse_from_file(path: &Path) -> eyre::Result<Self> {
        let file_contents = tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&file_contents)
    }

    /// Load configuration from TOML text.
    pub fn parse(contents: &str) -> eyre::Result<Self> {
        toml::from_str(contents).wrap_err("Failed to load configuration file")
    }
}

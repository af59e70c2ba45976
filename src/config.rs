use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::alignment::AlignmentPolicy;
use crate::error::{ExportError, ExportResult};

/// Exporter configuration loaded from YAML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    /// Candidate picks written by the velocity scanner
    #[serde(default = "default_picks_src")]
    pub picks_src: PathBuf,
    /// SQLite database of the pick monitor
    #[serde(default = "default_monitor_db")]
    pub monitor_db: PathBuf,
    /// Directory the website reads picks.json / portfolio.json from
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_picks_src() -> PathBuf { PathBuf::from("../Polymarket/velocity_picks.json") }
fn default_monitor_db() -> PathBuf { PathBuf::from("../Polymarket/velocity_monitor.sqlite") }
fn default_output_dir() -> PathBuf { PathBuf::from("data") }

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            picks_src: default_picks_src(),
            monitor_db: default_monitor_db(),
            output_dir: default_output_dir(),
        }
    }
}

impl PathsConfig {
    pub fn picks_dst(&self) -> PathBuf {
        self.output_dir.join("picks.json")
    }

    pub fn portfolio_dst(&self) -> PathBuf {
        self.output_dir.join("portfolio.json")
    }

    pub fn resolutions_csv(&self) -> PathBuf {
        self.output_dir.join("recent_resolutions.csv")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    /// How strictly bin signals must agree with the pick
    #[serde(default)]
    pub policy: AlignmentPolicy,
    /// Max entries in recent_resolutions
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    /// Also write recent_resolutions.csv
    #[serde(default)]
    pub write_csv: bool,
}

fn default_recent_limit() -> usize { 50 }

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            policy: AlignmentPolicy::default(),
            recent_limit: default_recent_limit(),
            write_csv: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl ExportConfig {
    /// Load configuration from YAML file
    pub fn load(path: &Path) -> ExportResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
            .map_err(|e| ExportError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(contents: &str) -> ExportResult<Self> {
        serde_yaml::from_str(contents).map_err(|e| ExportError::Config(e.to_string()))
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load_with_env(path: Option<&Path>) -> ExportResult<Self> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment-style lookups.
    ///
    /// Values that don't parse leave the current setting untouched.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("EXPORT_PICKS_SRC") {
            self.paths.picks_src = PathBuf::from(val);
        }
        if let Some(val) = lookup("EXPORT_MONITOR_DB") {
            self.paths.monitor_db = PathBuf::from(val);
        }
        if let Some(val) = lookup("EXPORT_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("EXPORT_POLICY") {
            self.publish.policy = val.parse().unwrap_or(self.publish.policy);
        }
        if let Some(val) = lookup("EXPORT_RECENT_LIMIT") {
            self.publish.recent_limit = val.parse().unwrap_or(self.publish.recent_limit);
        }
    }
}

//! # Job and Monitor Configuration
//!
//! ```toml
//! [job]
//! name = "Printing Picture..."
//! pages = 2
//!
//! [monitor]
//! enabled = true
//! poll_interval_ms = 2000
//! budget_secs = 3600
//! retain = true
//! max_resume_attempts = 10
//!
//! [logging]
//! verbose = true
//! session_log = "spooljob.log"
//! ```
//!
//! Every section and field is optional; omitted values take the defaults below.
//! The `[simulator]` table describes the simulated spooler the binary drives
//! (see `spoolguard_simulator::SimScenario`).

use serde::{Deserialize, Serialize};
use spoolguard_shared::RAW_DATATYPE;
use spoolguard_simulator::SimScenario;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulator: SimScenario,
}

/// What gets submitted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    #[serde(default = "default_job_name")]
    pub name: String,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default = "default_datatype")]
    pub datatype: String,
    /// Raw file copied into every page.
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Target name or enumeration index. Falls back to the default target.
    #[serde(default)]
    pub target: Option<String>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            name: default_job_name(),
            pages: default_pages(),
            datatype: default_datatype(),
            file: None,
            target: None,
        }
    }
}

/// How a submitted job is supervised.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
    /// Query job 0 before submitting and expect "not found".
    #[serde(default = "default_true")]
    pub probe_sentinel: bool,
    /// Hold the job with a retain command before monitoring.
    #[serde(default = "default_true")]
    pub retain: bool,
    /// Watch the job from a separate task while pages are still being issued.
    #[serde(default)]
    pub concurrent: bool,
    /// Stop resuming after this many attempts. Unset means resume on every error poll.
    #[serde(default)]
    pub max_resume_attempts: Option<u32>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: default_poll_interval_ms(),
            budget_secs: default_budget_secs(),
            probe_sentinel: true,
            retain: true,
            concurrent: false,
            max_resume_attempts: None,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Trace every device call.
    #[serde(default)]
    pub verbose: bool,
    /// Append log output here while monitoring.
    #[serde(default)]
    pub session_log: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.job.pages == 0 {
            return Err(ConfigError::Invalid("job.pages must be > 0".to_string()));
        }
        if self.job.datatype.is_empty() {
            return Err(ConfigError::Invalid("job.datatype must not be empty".to_string()));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("monitor.poll_interval_ms must be > 0".to_string()));
        }
        if self.monitor.budget() < self.monitor.poll_interval() {
            return Err(ConfigError::Invalid(
                "monitor.budget_secs must cover at least one poll interval".to_string(),
            ));
        }
        if self.monitor.max_resume_attempts == Some(0) {
            tracing::warn!("monitor.max_resume_attempts = 0 disables error recovery");
        }
        Ok(())
    }
}

// Default value functions
fn default_job_name() -> String { "Printing Raw File...".to_string() }
fn default_pages() -> u32 { 1 }
fn default_datatype() -> String { RAW_DATATYPE.to_string() }
fn default_poll_interval_ms() -> u64 { 2000 }
fn default_budget_secs() -> u64 { 3600 }
fn default_true() -> bool { true }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let config: Config = match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                return Err(ConfigError::Toml(e));
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path.display(), e);
            return Err(ConfigError::Io(e));
        }
    };
    config.validate()?;
    Ok(config)
}

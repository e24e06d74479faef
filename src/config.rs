//! Configuration loader and validator for kolboard.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub backend: Backend,
    pub report: Report,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Upper bound on concurrent remote writes during bulk operations.
    pub bulk_concurrency: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    Rest,
}

/// Where campaign rows live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Backend {
    pub kind: BackendKind,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub rest_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub storage_bucket: String,
}

/// Public report export settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Report {
    pub output_dir: String,
    pub title_prefix: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` wins, then `backend.database_url`, then a file under `data_dir`.
    pub fn database_url(&self) -> String {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                return url;
            }
        }
        self.backend
            .database_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("sqlite://{}/kolboard.db", self.app.data_dir))
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

fn blank(v: &Option<String>) -> bool {
    v.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.bulk_concurrency == 0 {
        return Err(ConfigError::Invalid("app.bulk_concurrency must be > 0"));
    }

    if cfg.backend.kind == BackendKind::Rest {
        if blank(&cfg.backend.rest_url) {
            return Err(ConfigError::Invalid("backend.rest_url must be set for the rest backend"));
        }
        if blank(&cfg.backend.api_key) {
            return Err(ConfigError::Invalid("backend.api_key must be set for the rest backend"));
        }
    }
    if cfg.backend.storage_bucket.trim().is_empty() {
        return Err(ConfigError::Invalid("backend.storage_bucket must be non-empty"));
    }

    if cfg.report.output_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("report.output_dir must be non-empty"));
    }

    Ok(())
}

/// Returns the example YAML shipped as `config.example.yaml`.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  bulk_concurrency: 4

backend:
  kind: sqlite
  database_url: ""
  rest_url: ""
  api_key: ""
  storage_bucket: "campaign-reports"

report:
  output_dir: "./data/reports"
  title_prefix: "Campaign Report"
"#
}

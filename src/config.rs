//! Configuration loader and validator for the outbreak watch bot.
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
    pub telegram: Telegram,
    pub sources: Sources,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Interval between in-process scrape cycles. 0 disables the loop
    /// (an external scheduler invokes the `run_cycle` binary instead).
    pub cycle_interval_ms: u64,
    /// Delay between consecutive sends inside one broadcast.
    pub broadcast_delay_ms: u64,
}

/// Telegram bot settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
}

/// Upstream page URLs, one per source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sources {
    pub nhc_url: String,
    pub moh_url: String,
    pub bno_url: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
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

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    // cycle_interval_ms == 0 is valid: cron drives the run_cycle binary.

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }

    if cfg.sources.nhc_url.trim().is_empty() {
        return Err(ConfigError::Invalid("sources.nhc_url must be non-empty"));
    }
    if cfg.sources.moh_url.trim().is_empty() {
        return Err(ConfigError::Invalid("sources.moh_url must be non-empty"));
    }
    if cfg.sources.bno_url.trim().is_empty() {
        return Err(ConfigError::Invalid("sources.bno_url must be non-empty"));
    }

    Ok(())
}

/// Example YAML content, kept parseable by the tests.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  cycle_interval_ms: 900000
  broadcast_delay_ms: 1000

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"

sources:
  nhc_url: "http://en.nhc.gov.cn/news.html"
  moh_url: "https://www.moh.gov.sg/2019-ncov-wuhan"
  bno_url: "https://bnonews.com/index.php/2020/02/the-latest-coronavirus-cases/"
"#
}

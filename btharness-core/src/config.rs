//! Harness configuration loaded from TOML.
//!
//! Every section is optional. The defaults reproduce the stock scenario
//! matrix: binance and kucoin, each held to a 90% win-rate floor and a 30%
//! drawdown ceiling, over six monthly windows of 2021.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Exchange, StakeAmount, Timerange};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no exchange given and no default exchange configured")]
    NoExchange,

    #[error("timerange {which} date is empty")]
    EmptyTimerangeToken { which: &'static str },

    #[error("invalid timerange '{0}' (expected <start>-<end>)")]
    InvalidTimerange(String),

    #[error("invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("invalid stake amount '{0}' (expected 'unlimited' or a positive number)")]
    InvalidStakeAmount(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub tool: ToolConfig,
    pub defaults: RunDefaults,
    pub exchanges: Vec<Exchange>,
    pub timeranges: Vec<Timerange>,
}

/// How to reach the external backtesting tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Executable name or path.
    pub program: String,
    /// Strategy passed to `--strategy-list` and looked up in the report.
    pub strategy: String,
    /// Working directory of every run.
    pub repo_root: PathBuf,
    /// `--user-data` value, relative to `repo_root`.
    pub user_data: PathBuf,
}

/// Per-run defaults, overridable per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    pub max_open_trades: u32,
    pub stake_amount: StakeAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts_dir: Option<PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "freqtrade".into(),
            strategy: "NostalgiaForInfinityNext".into(),
            repo_root: PathBuf::from("."),
            user_data: PathBuf::from("user_data"),
        }
    }
}

impl ToolConfig {
    /// `<user_data>/data`, relative to the repository root.
    pub fn data_dir(&self) -> PathBuf {
        self.user_data.join("data")
    }

    /// `data_dir` resolved against the repository root.
    pub fn data_dir_on_disk(&self) -> PathBuf {
        self.repo_root.join(self.data_dir())
    }
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            exchange: None,
            max_open_trades: 5,
            stake_amount: StakeAmount::Unlimited,
            artifacts_dir: None,
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            tool: ToolConfig::default(),
            defaults: RunDefaults::default(),
            exchanges: default_exchanges(),
            timeranges: default_timeranges(),
        }
    }
}

fn default_exchanges() -> Vec<Exchange> {
    vec![
        Exchange::new("binance", 90.0, 30.0),
        Exchange::new("kucoin", 90.0, 30.0),
    ]
}

fn default_timeranges() -> Vec<Timerange> {
    Timerange::monthly("20210101", 6).unwrap_or_default()
}

impl HarnessConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn exchange(&self, name: &str) -> Option<&Exchange> {
        self.exchanges.iter().find(|e| e.name == name)
    }
}

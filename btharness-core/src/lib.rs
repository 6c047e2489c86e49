//! btharness core — value types, harness configuration, command-line
//! construction and results-report normalization.
//!
//! Nothing in this crate spawns processes. It covers:
//! - `Timerange`, `Exchange`, `StakeAmount` value types
//! - `HarnessConfig` (TOML) with the stock exchange × timerange matrix
//! - `Invocation`: the exact argument vector for one backtest run
//! - `ProcessResult`: captured exit code, streams and command line
//! - `BacktestOutcome`: typed report blocks plus derived percentages

pub mod config;
pub mod domain;
pub mod invocation;
pub mod process;
pub mod report;

pub use config::{ConfigError, HarnessConfig, RunDefaults, ToolConfig};
pub use domain::{Exchange, StakeAmount, Timerange};
pub use invocation::{
    BacktestRequest, ExchangeConfigSource, Invocation, PairlistConfig, EXPORT_FILENAME,
    PAIRLIST_CONFIG_FILENAME,
};
pub use process::{ProcessError, ProcessResult};
pub use report::{BacktestOutcome, ReportError, StatsPct, StrategyResults, StrategySummary};

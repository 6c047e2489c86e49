//! Typed view of the backtesting tool's JSON report and the derived
//! percentages the scenario thresholds are checked against.
//!
//! Only two key paths matter:
//! - `strategy_comparison[0]` → [`StrategySummary`] (needs `wins`, `trades`)
//! - `strategy.<name>` → [`StrategyResults`] (needs `max_drawdown`)
//!
//! Everything else the tool emits is kept in `extra` maps for logging.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("malformed results report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("results report has an empty 'strategy_comparison' list")]
    EmptyComparison,

    #[error("results report has no 'strategy.{0}' entry")]
    StrategyMissing(String),

    #[error("malformed 'strategy.{name}' entry: {source}")]
    StrategyShape {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot derive win-rate: report lists zero trades")]
    NoTrades,
}

/// Top level of the results file.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsReport {
    pub strategy_comparison: Vec<StrategySummary>,
    pub strategy: BTreeMap<String, Value>,
}

/// One row of `strategy_comparison`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub trades: u64,
    pub wins: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draws: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub losses: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_mean_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_total_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_total_abs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_avg: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// `strategy.<name>`: the full per-strategy block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResults {
    /// Fraction, e.g. `0.25` for 25%.
    pub max_drawdown: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_trades: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wins: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub losses: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draws: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_total: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtest_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtest_end: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pairlist: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Percentages the scenario thresholds are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsPct {
    pub max_drawdown: f64,
    pub winrate: f64,
}

impl StatsPct {
    pub fn derive(summary: &StrategySummary, results: &StrategyResults) -> Result<Self, ReportError> {
        Ok(Self {
            max_drawdown: drawdown_pct(results.max_drawdown),
            winrate: winrate_pct(summary.wins, summary.trades)?,
        })
    }
}

/// `round(wins * 100 / trades, 2)`. Zero trades is an error.
pub fn winrate_pct(wins: u64, trades: u64) -> Result<f64, ReportError> {
    if trades == 0 {
        return Err(ReportError::NoTrades);
    }
    Ok(round2(wins as f64 * 100.0 / trades as f64))
}

/// Drawdown fraction as a percentage.
pub fn drawdown_pct(raw: f64) -> f64 {
    raw * 100.0
}

// Rounds the exact binary value half-to-even, so 93.125 becomes 93.12.
fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

/// Normalized outcome of one backtest invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub stdout: String,
    pub stderr: String,
    pub results: StrategyResults,
    pub full_stats: StrategySummary,
    pub stats_pct: StatsPct,
}

impl BacktestOutcome {
    /// Parse a results report and pull out the blocks for `strategy`.
    pub fn from_report_json(
        json: &str,
        strategy: &str,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Result<Self, ReportError> {
        let report: ResultsReport = serde_json::from_str(json)?;
        let full_stats = report
            .strategy_comparison
            .into_iter()
            .next()
            .ok_or(ReportError::EmptyComparison)?;
        let raw = report
            .strategy
            .get(strategy)
            .cloned()
            .ok_or_else(|| ReportError::StrategyMissing(strategy.to_string()))?;
        let results: StrategyResults =
            serde_json::from_value(raw).map_err(|source| ReportError::StrategyShape {
                name: strategy.to_string(),
                source,
            })?;
        let stats_pct = StatsPct::derive(&full_stats, &results)?;

        Ok(Self {
            stdout: stdout.into().trim().to_string(),
            stderr: stderr.into().trim().to_string(),
            results,
            full_stats,
            stats_pct,
        })
    }
}

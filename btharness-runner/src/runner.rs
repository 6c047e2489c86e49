//! Backtest runner — spawns the external tool and normalizes its report.
//!
//! One call to [`Backtest::run`]:
//! 1. resolves the invocation (fails before any I/O if no exchange is known)
//! 2. writes the generated pairlist config, if the request carries pairs
//! 3. runs the tool synchronously from the repository root, capturing both streams
//! 4. locates the `backtest-results-*.json` the tool exported into the scratch dir
//! 5. copies artifacts (best effort) and parses the report into a `BacktestOutcome`

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use btharness_core::{
    BacktestOutcome, BacktestRequest, ConfigError, ExchangeConfigSource, HarnessConfig,
    Invocation, ProcessError, ProcessResult, ReportError, RunDefaults, StatsPct, StrategyResults,
    StrategySummary, Timerange, ToolConfig,
};

use crate::artifacts::ArtifactDir;

/// File-name prefix of the report the tool exports.
pub const RESULTS_FILE_PREFIX: &str = "backtest-results-";

/// Errors from a single backtest run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to write pairlist config {path}: {source}")]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process error: {0}")]
    Process(#[from] ProcessError),

    #[error("backtesting tool exited with code {code}\n{result}")]
    ToolFailed {
        code: i32,
        result: Box<ProcessResult>,
    },

    #[error("backtesting tool exited successfully but wrote no {prefix}*.json under {dir}", prefix = RESULTS_FILE_PREFIX)]
    MissingResults { dir: PathBuf },

    #[error("failed to read results file {path}: {source}")]
    ReadResults {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report error: {0}")]
    Report(#[from] ReportError),
}

/// Anything that can turn a request into a normalized outcome.
///
/// [`Backtest`] is the real implementation; the scenario matrix only needs
/// this seam.
pub trait BacktestExecutor {
    fn run(&self, request: &BacktestRequest, scratch_dir: &Path)
        -> Result<BacktestOutcome, RunError>;
}

/// Runs the external backtesting tool.
#[derive(Debug, Clone)]
pub struct Backtest {
    tool: ToolConfig,
    defaults: RunDefaults,
    artifacts: Option<ArtifactDir>,
}

impl Backtest {
    pub fn new(tool: ToolConfig) -> Self {
        Self {
            tool,
            defaults: RunDefaults::default(),
            artifacts: None,
        }
    }

    /// Build from a harness config, creating the artifact directory if one is set.
    pub fn from_config(config: &HarnessConfig) -> anyhow::Result<Self> {
        let artifacts = config
            .defaults
            .artifacts_dir
            .as_ref()
            .map(ArtifactDir::create)
            .transpose()?;
        Ok(Self {
            tool: config.tool.clone(),
            defaults: config.defaults.clone(),
            artifacts,
        })
    }

    /// Exchange used when a request does not name one.
    pub fn with_default_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.defaults.exchange = Some(exchange.into());
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactDir) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    pub fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    pub fn defaults(&self) -> &RunDefaults {
        &self.defaults
    }

    /// A request for `timerange` carrying the configured sizing defaults.
    pub fn request(&self, timerange: Timerange) -> BacktestRequest {
        BacktestRequest::new(timerange)
            .with_max_open_trades(self.defaults.max_open_trades)
            .with_stake_amount(self.defaults.stake_amount)
    }

    /// Resolve the invocation without running anything.
    pub fn invocation(
        &self,
        request: &BacktestRequest,
        scratch_dir: &Path,
    ) -> Result<Invocation, ConfigError> {
        Invocation::build(
            &self.tool,
            request,
            self.defaults.exchange.as_deref(),
            scratch_dir,
        )
    }

    /// Run the tool and return the captured process result, whatever its exit code.
    pub fn execute(&self, invocation: &Invocation) -> Result<ProcessResult, RunError> {
        if let ExchangeConfigSource::Generated { path, config } = &invocation.exchange_config {
            write_pairlist_config(path, config)?;
        }

        let cmdline = invocation.cmdline();
        info!(
            "Running cmdline '{}' on '{}'",
            cmdline.join(" "),
            invocation.working_dir.display()
        );

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RunError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let result = ProcessResult::from_output(&output, cmdline)?;
        info!("Command Result:\n{result}");
        Ok(result)
    }
}

impl BacktestExecutor for Backtest {
    fn run(
        &self,
        request: &BacktestRequest,
        scratch_dir: &Path,
    ) -> Result<BacktestOutcome, RunError> {
        let invocation = self.invocation(request, scratch_dir)?;
        let result = self.execute(&invocation)?;

        if !result.success() {
            error!(
                exchange = %invocation.exchange,
                timerange = %request.timerange,
                "backtesting tool failed:\n{result}"
            );
            return Err(RunError::ToolFailed {
                code: result.exitcode(),
                result: Box::new(result),
            });
        }

        let results_file = locate_results_file(scratch_dir)?;

        if let Some(artifacts) = &self.artifacts {
            match artifacts.save(&results_file, result.stdout()) {
                Ok(saved) => info!(
                    "Saved artifacts {} and {}",
                    saved.results_json.display(),
                    saved.stdout_txt.display()
                ),
                Err(e) => warn!("failed to save artifacts: {e:#}"),
            }
        }

        let json = std::fs::read_to_string(&results_file).map_err(|source| {
            RunError::ReadResults {
                path: results_file.clone(),
                source,
            }
        })?;
        let outcome = BacktestOutcome::from_report_json(
            &json,
            &self.tool.strategy,
            result.stdout(),
            result.stderr(),
        )?;

        log_outcome(&outcome);
        Ok(outcome)
    }
}

fn write_pairlist_config(
    path: &Path,
    config: &btharness_core::PairlistConfig,
) -> Result<(), RunError> {
    let to_io = |source: std::io::Error| RunError::WriteConfig {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_io)?;
    }
    let json = serde_json::to_string(config).map_err(|e| to_io(e.into()))?;
    std::fs::write(path, json).map_err(to_io)
}

/// All exported results files under `dir`, sorted by path.
///
/// Matches `backtest-results-*.json` at any depth and skips the tool's
/// `*.meta.json` sidecars.
pub fn find_results_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.starts_with(RESULTS_FILE_PREFIX)
                && name.ends_with(".json")
                && !name.ends_with(".meta.json")
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// The first results file under `dir`; none is an error.
pub fn locate_results_file(dir: &Path) -> Result<PathBuf, RunError> {
    let mut files = find_results_files(dir);
    if files.len() > 1 {
        warn!(
            "found {} results files under {}, using {}",
            files.len(),
            dir.display(),
            files[0].display()
        );
    }
    if files.is_empty() {
        return Err(RunError::MissingResults {
            dir: dir.to_path_buf(),
        });
    }
    Ok(files.swap_remove(0))
}

#[derive(Serialize)]
struct OutcomeLog<'a> {
    results: &'a StrategyResults,
    full_stats: &'a StrategySummary,
    stats_pct: &'a StatsPct,
}

fn log_outcome(outcome: &BacktestOutcome) {
    let view = OutcomeLog {
        results: &outcome.results,
        full_stats: &outcome.full_stats,
        stats_pct: &outcome.stats_pct,
    };
    match serde_json::to_string_pretty(&view) {
        Ok(text) => info!("Backtest results:\n{text}"),
        Err(e) => warn!("failed to render backtest results: {e}"),
    }
}

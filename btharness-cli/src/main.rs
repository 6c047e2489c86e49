//! btharness CLI — run backtests through the external tool and check thresholds.
//!
//! Commands:
//! - `run` — one backtest, prints the normalized outcome
//! - `matrix` — every exchange × timerange case, exits 1 if any fails
//! - `check-data` — verify historical data is present per exchange
//! - `show-config` — print the effective configuration as TOML

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use btharness_core::{BacktestOutcome, HarnessConfig, StakeAmount, Timerange};
use btharness_runner::{
    check_exchange_data, init_logging, run_matrix, Backtest, BacktestExecutor, LogFormat,
    MatrixReport, ScenarioCase, ScenarioMatrix,
};

#[derive(Parser)]
#[command(
    name = "btharness",
    about = "btharness — win-rate and drawdown checks over an external backtesting tool"
)]
struct Cli {
    /// Harness config (TOML). Built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,

    /// Copy results JSON and stdout of every run into this directory.
    #[arg(long, global = true)]
    artifacts_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest and print the derived statistics.
    Run {
        /// Start date (YYYYMMDD).
        #[arg(long)]
        start: String,

        /// End date (YYYYMMDD).
        #[arg(long)]
        end: String,

        /// Exchange. Defaults to `defaults.exchange` from the config.
        #[arg(long)]
        exchange: Option<String>,

        /// Restrict the run to these pairs (repeatable). Writes a generated pairlist config.
        #[arg(long = "pair")]
        pairs: Vec<String>,

        #[arg(long)]
        max_open_trades: Option<u32>,

        /// `unlimited` or a positive amount.
        #[arg(long)]
        stake_amount: Option<String>,

        /// Scratch directory for the export. A temporary directory when omitted.
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
    },
    /// Run the exchange × timerange matrix and check thresholds.
    Matrix {
        /// Only these exchanges (repeatable).
        #[arg(long = "exchange")]
        exchanges: Vec<String>,

        /// Only these timeranges, as <start>-<end> (repeatable).
        #[arg(long = "timerange")]
        timeranges: Vec<String>,

        /// Keep per-case scratch directories instead of deleting them.
        #[arg(long, default_value_t = false)]
        keep_scratch: bool,
    },
    /// Check that historical data exists for each exchange.
    CheckData {
        /// Exchanges to check (repeatable). All configured exchanges when omitted.
        #[arg(long = "exchange")]
        exchanges: Vec<String>,
    },
    /// Print the effective configuration.
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format.into());

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(dir) = cli.artifacts_dir {
        config.defaults.artifacts_dir = Some(dir);
    }

    match cli.command {
        Commands::Run {
            start,
            end,
            exchange,
            pairs,
            max_open_trades,
            stake_amount,
            scratch_dir,
        } => run_single(
            &config,
            &start,
            &end,
            exchange,
            pairs,
            max_open_trades,
            stake_amount,
            scratch_dir,
        ),
        Commands::Matrix {
            exchanges,
            timeranges,
            keep_scratch,
        } => run_matrix_cmd(&config, &exchanges, &timeranges, keep_scratch),
        Commands::CheckData { exchanges } => run_check_data(&config, &exchanges),
        Commands::ShowConfig => {
            print!("{}", config.to_toml().context("failed to render config")?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => Ok(HarnessConfig::default()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_single(
    config: &HarnessConfig,
    start: &str,
    end: &str,
    exchange: Option<String>,
    pairs: Vec<String>,
    max_open_trades: Option<u32>,
    stake_amount: Option<String>,
    scratch_dir: Option<PathBuf>,
) -> Result<()> {
    let backtest = Backtest::from_config(config)?;

    let mut request = backtest.request(Timerange::new(start, end)?);
    if let Some(exchange) = exchange {
        request = request.with_exchange(exchange);
    }
    if !pairs.is_empty() {
        request = request.with_pairlist(pairs);
    }
    if let Some(n) = max_open_trades {
        request = request.with_max_open_trades(n);
    }
    if let Some(amount) = stake_amount {
        request = request.with_stake_amount(amount.parse::<StakeAmount>()?);
    }

    // Keep the TempDir alive until the run is done.
    let temp;
    let scratch = match scratch_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            dir
        }
        None => {
            temp = tempfile::Builder::new().prefix("btharness-").tempdir()?;
            temp.path().to_path_buf()
        }
    };

    let outcome = backtest.run(&request, &scratch)?;
    print_outcome(&request.timerange, &outcome);
    Ok(())
}

fn run_matrix_cmd(
    config: &HarnessConfig,
    exchanges: &[String],
    timeranges: &[String],
    keep_scratch: bool,
) -> Result<()> {
    let timeranges = timeranges
        .iter()
        .map(|t| Timerange::parse(t))
        .collect::<Result<Vec<_>, _>>()?;
    let matrix = ScenarioMatrix::from_config(config)
        .retain_exchanges(exchanges)
        .retain_timeranges(&timeranges);
    if matrix.is_empty() {
        bail!("the scenario matrix is empty after filtering");
    }

    let backtest = Backtest::from_config(config)?;
    info!(cases = matrix.len(), "running scenario matrix");

    let report = run_matrix(
        &backtest,
        &matrix,
        &config.tool.data_dir_on_disk(),
        &config.defaults,
        |case: &ScenarioCase| {
            let dir = tempfile::Builder::new()
                .prefix(&format!("btharness-{}-", case.id()))
                .tempdir()?;
            Ok(if keep_scratch {
                ScratchDir::Kept(dir.keep())
            } else {
                ScratchDir::Temp(dir)
            })
        },
    );

    print_matrix(&report);
    if !report.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Per-case scratch location, deleted on drop unless kept.
enum ScratchDir {
    Temp(tempfile::TempDir),
    Kept(PathBuf),
}

impl AsRef<Path> for ScratchDir {
    fn as_ref(&self) -> &Path {
        match self {
            ScratchDir::Temp(dir) => dir.path(),
            ScratchDir::Kept(path) => path,
        }
    }
}

fn run_check_data(config: &HarnessConfig, exchanges: &[String]) -> Result<()> {
    let names: Vec<String> = if exchanges.is_empty() {
        config.exchanges.iter().map(|e| e.name.clone()).collect()
    } else {
        exchanges.to_vec()
    };
    let data_dir = config.tool.data_dir_on_disk();

    let mut missing = 0;
    for name in &names {
        match check_exchange_data(&data_dir, name) {
            Ok(files) => println!("{name:<12} ok ({files} data files)"),
            Err(e) => {
                missing += 1;
                eprintln!("{name:<12} {e}");
            }
        }
    }

    if missing > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn print_outcome(timerange: &Timerange, outcome: &BacktestOutcome) {
    println!();
    println!("=== Backtest Result ===");
    if let Some(key) = &outcome.full_stats.key {
        println!("Strategy:       {key}");
    }
    println!("Timerange:      {timerange}");
    println!("Trades:         {}", outcome.full_stats.trades);
    println!("Wins:           {}", outcome.full_stats.wins);
    if let Some(losses) = outcome.full_stats.losses {
        println!("Losses:         {losses}");
    }
    if let Some(profit) = outcome.full_stats.profit_total_pct {
        println!("Total Profit:   {profit:.2}%");
    }
    println!();
    println!("--- Thresholded ---");
    println!("Win Rate:       {:.2}%", outcome.stats_pct.winrate);
    println!("Max Drawdown:   {:.2}%", outcome.stats_pct.max_drawdown);
    println!();
}

fn print_matrix(report: &MatrixReport) {
    println!();
    println!("{:<36} Result", "Case");
    println!("{}", "-".repeat(72));
    for case in &report.cases {
        println!("{:<36} {}", case.id, case.status);
    }
    println!();
    println!(
        "{} passed, {} failed, {} total",
        report.passed(),
        report.failed(),
        report.cases.len()
    );
}

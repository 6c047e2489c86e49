//! Scenario matrix: exchanges × timeranges, each case checked against the
//! exchange's win-rate floor and drawdown ceiling.
//!
//! Cases are independent. A failing case never stops the rest; the only
//! short-circuit is the data-presence check, which runs once per exchange
//! and fails every case of that exchange without spawning anything.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{error, info};

use btharness_core::{
    BacktestRequest, Exchange, HarnessConfig, RunDefaults, StatsPct, Timerange,
};

use crate::data_check::check_exchange_data;
use crate::runner::BacktestExecutor;

/// The exchange and timerange lists to cross.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioMatrix {
    pub exchanges: Vec<Exchange>,
    pub timeranges: Vec<Timerange>,
}

/// One exchange × timerange combination.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioCase {
    pub exchange: Exchange,
    pub timerange: Timerange,
}

impl ScenarioCase {
    /// `<exchange>-<start>-<end>`
    pub fn id(&self) -> String {
        format!("{}-{}", self.exchange.name, self.timerange)
    }

    pub fn request(&self, defaults: &RunDefaults) -> BacktestRequest {
        BacktestRequest::new(self.timerange.clone())
            .with_exchange(self.exchange.name.clone())
            .with_max_open_trades(defaults.max_open_trades)
            .with_stake_amount(defaults.stake_amount)
    }
}

impl ScenarioMatrix {
    pub fn new(exchanges: Vec<Exchange>, timeranges: Vec<Timerange>) -> Self {
        Self {
            exchanges,
            timeranges,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.exchanges.clone(), config.timeranges.clone())
    }

    /// Keep only the named exchanges. An empty filter keeps everything.
    pub fn retain_exchanges(mut self, names: &[String]) -> Self {
        if !names.is_empty() {
            self.exchanges.retain(|e| names.contains(&e.name));
        }
        self
    }

    /// Keep only the listed timeranges. An empty filter keeps everything.
    pub fn retain_timeranges(mut self, ranges: &[Timerange]) -> Self {
        if !ranges.is_empty() {
            self.timeranges.retain(|t| ranges.contains(t));
        }
        self
    }

    /// Cross product, exchange-major.
    pub fn cases(&self) -> Vec<ScenarioCase> {
        self.by_exchange().flat_map(|(_, cases)| cases).collect()
    }

    /// Cases grouped per exchange, in enumeration order.
    pub fn by_exchange(&self) -> impl Iterator<Item = (&Exchange, Vec<ScenarioCase>)> + '_ {
        self.exchanges.iter().map(move |exchange| {
            let cases = self
                .timeranges
                .iter()
                .map(|timerange| ScenarioCase {
                    exchange: exchange.clone(),
                    timerange: timerange.clone(),
                })
                .collect();
            (exchange, cases)
        })
    }

    pub fn len(&self) -> usize {
        self.exchanges.len() * self.timeranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A threshold the outcome missed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum Violation {
    Winrate { actual: f64, minimum: f64 },
    MaxDrawdown { actual: f64, maximum: f64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Winrate { actual, minimum } => {
                write!(f, "winrate {actual:.2}% is below the {minimum:.2}% floor")
            }
            Violation::MaxDrawdown { actual, maximum } => {
                write!(f, "max drawdown {actual:.2}% exceeds the {maximum:.2}% ceiling")
            }
        }
    }
}

/// Check `stats` against the exchange thresholds.
///
/// Passes when `winrate >= exchange.winrate` and
/// `max_drawdown <= exchange.max_drawdown`.
pub fn evaluate(exchange: &Exchange, stats: &StatsPct) -> Vec<Violation> {
    let mut violations = Vec::new();
    if stats.winrate < exchange.winrate {
        violations.push(Violation::Winrate {
            actual: stats.winrate,
            minimum: exchange.winrate,
        });
    }
    if stats.max_drawdown > exchange.max_drawdown {
        violations.push(Violation::MaxDrawdown {
            actual: stats.max_drawdown,
            maximum: exchange.max_drawdown,
        });
    }
    violations
}

/// Final state of one case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaseStatus {
    Passed { stats: StatsPct },
    ThresholdViolation { stats: StatsPct, violations: Vec<Violation> },
    Errored { message: String },
    DataMissing { message: String },
}

impl CaseStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, CaseStatus::Passed { .. })
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Passed { stats } => write!(
                f,
                "PASS (winrate {:.2}%, max drawdown {:.2}%)",
                stats.winrate, stats.max_drawdown
            ),
            CaseStatus::ThresholdViolation { violations, .. } => {
                let reasons: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                write!(f, "FAIL ({})", reasons.join("; "))
            }
            CaseStatus::Errored { message } => write!(f, "ERROR ({message})"),
            CaseStatus::DataMissing { message } => write!(f, "NO DATA ({message})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub id: String,
    pub exchange: String,
    pub timerange: String,
    pub status: CaseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatrixReport {
    pub cases: Vec<CaseReport>,
}

impl MatrixReport {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.status.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn get(&self, id: &str) -> Option<&CaseReport> {
        self.cases.iter().find(|c| c.id == id)
    }
}

/// Run every case of `matrix` in enumeration order.
///
/// `data_dir` is checked once per exchange before its cases run. Each case
/// gets a fresh scratch location from `scratch`; the returned guard is held
/// for the duration of the case and dropped afterwards.
pub fn run_matrix<E, F, S>(
    executor: &E,
    matrix: &ScenarioMatrix,
    data_dir: &Path,
    defaults: &RunDefaults,
    mut scratch: F,
) -> MatrixReport
where
    E: BacktestExecutor + ?Sized,
    F: FnMut(&ScenarioCase) -> std::io::Result<S>,
    S: AsRef<Path>,
{
    let mut report = MatrixReport::default();

    for (exchange, cases) in matrix.by_exchange() {

        match check_exchange_data(data_dir, &exchange.name) {
            Ok(files) => info!(exchange = %exchange.name, files, "exchange data present"),
            Err(e) => {
                error!(exchange = %exchange.name, "{e}");
                let message = e.to_string();
                for case in &cases {
                    report.cases.push(case_report(
                        case,
                        CaseStatus::DataMissing {
                            message: message.clone(),
                        },
                    ));
                }
                continue;
            }
        }

        for case in &cases {
            let status = run_case(executor, case, defaults, &mut scratch);
            info!(case = %case.id(), "{status}");
            report.cases.push(case_report(case, status));
        }
    }

    report
}

fn run_case<E, F, S>(
    executor: &E,
    case: &ScenarioCase,
    defaults: &RunDefaults,
    scratch: &mut F,
) -> CaseStatus
where
    E: BacktestExecutor + ?Sized,
    F: FnMut(&ScenarioCase) -> std::io::Result<S>,
    S: AsRef<Path>,
{
    let dir = match scratch(case) {
        Ok(dir) => dir,
        Err(e) => {
            return CaseStatus::Errored {
                message: format!("failed to create scratch directory: {e}"),
            }
        }
    };

    match executor.run(&case.request(defaults), dir.as_ref()) {
        Ok(outcome) => {
            let stats = outcome.stats_pct;
            let violations = evaluate(&case.exchange, &stats);
            if violations.is_empty() {
                CaseStatus::Passed { stats }
            } else {
                CaseStatus::ThresholdViolation { stats, violations }
            }
        }
        Err(e) => CaseStatus::Errored {
            message: e.to_string(),
        },
    }
}

fn case_report(case: &ScenarioCase, status: CaseStatus) -> CaseReport {
    CaseReport {
        id: case.id(),
        exchange: case.exchange.name.clone(),
        timerange: case.timerange.to_string(),
        status,
    }
}

//! Command-line construction for the external backtesting tool.
//!
//! Pure: resolves the exchange, picks the static or generated pairlist
//! config, and lays out the exact argument vector. Writing the generated
//! config and spawning the process belong to the runner.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ToolConfig};
use crate::domain::{StakeAmount, Timerange};

/// Name of the export file handed to `--export-filename`. The tool writes a
/// timestamped `backtest-results-*.json` next to it.
pub const EXPORT_FILENAME: &str = "backtest-results.json";

/// Name of the generated pairlist config inside the scratch directory.
pub const PAIRLIST_CONFIG_FILENAME: &str = "test-pairlist.json";

/// One backtest call: window, overrides and sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRequest {
    pub timerange: Timerange,
    pub exchange: Option<String>,
    pub pairlist: Option<Vec<String>>,
    pub max_open_trades: u32,
    pub stake_amount: StakeAmount,
}

impl BacktestRequest {
    pub fn new(timerange: Timerange) -> Self {
        Self {
            timerange,
            exchange: None,
            pairlist: None,
            max_open_trades: 5,
            stake_amount: StakeAmount::Unlimited,
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_pairlist<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pairlist = Some(pairs.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_open_trades(mut self, n: u32) -> Self {
        self.max_open_trades = n;
        self
    }

    pub fn with_stake_amount(mut self, amount: StakeAmount) -> Self {
        self.stake_amount = amount;
        self
    }
}

/// `{"exchange": {"name": ..., "pair_whitelist": [...]}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairlistConfig {
    pub exchange: PairlistExchange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairlistExchange {
    pub name: String,
    pub pair_whitelist: Vec<String>,
}

impl PairlistConfig {
    pub fn new(exchange: &str, pairs: &[String]) -> Self {
        Self {
            exchange: PairlistExchange {
                name: exchange.to_string(),
                pair_whitelist: pairs.to_vec(),
            },
        }
    }
}

/// Where the exchange config for a run comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeConfigSource {
    /// `<data_dir>/<exchange>-usdt-static.json`, relative to the repository root.
    Static(PathBuf),
    /// A pairlist config the runner must write before spawning.
    Generated { path: PathBuf, config: PairlistConfig },
}

impl ExchangeConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ExchangeConfigSource::Static(path) => path.as_path(),
            ExchangeConfigSource::Generated { path, .. } => path.as_path(),
        }
    }
}

/// A fully resolved invocation, ready to spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub exchange: String,
    pub exchange_config: ExchangeConfigSource,
    pub export_file: PathBuf,
    pub working_dir: PathBuf,
}

impl Invocation {
    /// Resolve `request` into an invocation writing into `scratch_dir`.
    ///
    /// The request's exchange wins over `default_exchange`; with neither
    /// (or only empty names) this fails before anything touches the disk.
    pub fn build(
        tool: &ToolConfig,
        request: &BacktestRequest,
        default_exchange: Option<&str>,
        scratch_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let exchange = resolve_exchange(request.exchange.as_deref(), default_exchange)?;
        let data_dir = tool.data_dir();
        let export_file = scratch_dir.join(EXPORT_FILENAME);

        let exchange_config = match &request.pairlist {
            None => ExchangeConfigSource::Static(static_exchange_config(&data_dir, &exchange)),
            Some(pairs) => ExchangeConfigSource::Generated {
                path: scratch_dir.join(PAIRLIST_CONFIG_FILENAME),
                config: PairlistConfig::new(&exchange, pairs),
            },
        };

        let args = vec![
            "backtesting".to_string(),
            format!("--user-data={}", tool.user_data.display()),
            format!("--strategy-list={}", tool.strategy),
            format!("--timerange={}", request.timerange),
            format!("--max-open-trades={}", request.max_open_trades),
            format!("--stake-amount={}", request.stake_amount),
            format!("--config={}", data_dir.join("pairlists.json").display()),
            format!("--config={}", exchange_config.path().display()),
            format!("--export-filename={}", export_file.display()),
        ];

        Ok(Self {
            program: tool.program.clone(),
            args,
            exchange,
            exchange_config,
            export_file,
            working_dir: tool.repo_root.clone(),
        })
    }

    /// Program followed by its arguments.
    pub fn cmdline(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// `<data_dir>/<exchange>-usdt-static.json`
pub fn static_exchange_config(data_dir: &Path, exchange: &str) -> PathBuf {
    data_dir.join(format!("{exchange}-usdt-static.json"))
}

fn resolve_exchange(explicit: Option<&str>, default: Option<&str>) -> Result<String, ConfigError> {
    explicit
        .filter(|name| !name.trim().is_empty())
        .or(default.filter(|name| !name.trim().is_empty()))
        .map(|name| name.trim().to_string())
        .ok_or(ConfigError::NoExchange)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> BacktestRequest {
        BacktestRequest::new(Timerange::new("20210101", "20210201").unwrap())
    }

    #[test]
    fn static_config_when_no_pairlist() {
        let tool = ToolConfig::default();
        let inv = Invocation::build(
            &tool,
            &request().with_exchange("binance"),
            None,
            Path::new("/tmp/case"),
        )
        .unwrap();

        assert_eq!(
            inv.cmdline(),
            vec![
                "freqtrade",
                "backtesting",
                "--user-data=user_data",
                "--strategy-list=NostalgiaForInfinityNext",
                "--timerange=20210101-20210201",
                "--max-open-trades=5",
                "--stake-amount=unlimited",
                "--config=user_data/data/pairlists.json",
                "--config=user_data/data/binance-usdt-static.json",
                "--export-filename=/tmp/case/backtest-results.json",
            ]
        );
        assert!(matches!(inv.exchange_config, ExchangeConfigSource::Static(_)));
        assert!(!inv.args.iter().any(|a| a.contains(PAIRLIST_CONFIG_FILENAME)));
        assert_eq!(inv.working_dir, PathBuf::from("."));
    }

    #[test]
    fn generated_config_replaces_static_one() {
        let tool = ToolConfig::default();
        let inv = Invocation::build(
            &tool,
            &request()
                .with_exchange("kucoin")
                .with_pairlist(["BTC/USDT", "ETH/USDT"]),
            None,
            Path::new("/tmp/case"),
        )
        .unwrap();

        match &inv.exchange_config {
            ExchangeConfigSource::Generated { path, config } => {
                assert_eq!(path, &PathBuf::from("/tmp/case/test-pairlist.json"));
                assert_eq!(config.exchange.name, "kucoin");
                assert_eq!(config.exchange.pair_whitelist, vec!["BTC/USDT", "ETH/USDT"]);
            }
            other => panic!("expected generated config, got {other:?}"),
        }
        assert_eq!(inv.args[7], "--config=/tmp/case/test-pairlist.json");
        assert!(!inv.args.iter().any(|a| a.contains("usdt-static")));
    }

    #[test]
    fn request_exchange_overrides_default() {
        let tool = ToolConfig::default();
        let inv = Invocation::build(
            &tool,
            &request().with_exchange("kucoin"),
            Some("binance"),
            Path::new("/tmp"),
        )
        .unwrap();
        assert_eq!(inv.exchange, "kucoin");

        let inv = Invocation::build(&tool, &request(), Some("binance"), Path::new("/tmp")).unwrap();
        assert_eq!(inv.exchange, "binance");
    }

    #[test]
    fn missing_exchange_is_a_config_error() {
        let tool = ToolConfig::default();
        let err = Invocation::build(&tool, &request(), None, Path::new("/tmp")).unwrap_err();
        assert!(matches!(err, ConfigError::NoExchange));

        let err = Invocation::build(&tool, &request().with_exchange(""), Some(" "), Path::new("/tmp"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoExchange));
    }

    #[test]
    fn sizing_overrides_are_rendered() {
        let tool = ToolConfig {
            strategy: "MyStrategy".into(),
            ..ToolConfig::default()
        };
        let inv = Invocation::build(
            &tool,
            &request()
                .with_exchange("binance")
                .with_max_open_trades(3)
                .with_stake_amount(StakeAmount::Fixed(100.0)),
            None,
            Path::new("/tmp"),
        )
        .unwrap();
        assert!(inv.args.contains(&"--strategy-list=MyStrategy".to_string()));
        assert!(inv.args.contains(&"--max-open-trades=3".to_string()));
        assert!(inv.args.contains(&"--stake-amount=100".to_string()));
    }

    #[test]
    fn pairlist_config_serializes_to_expected_shape() {
        let config = PairlistConfig::new("binance", &["BTC/USDT".to_string()]);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"exchange": {"name": "binance", "pair_whitelist": ["BTC/USDT"]}})
        );
    }
}

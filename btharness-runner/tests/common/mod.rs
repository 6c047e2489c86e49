//! Stub backtesting tool shared by the integration tests.
//!
//! The stub is a POSIX shell script named `backtesting` placed in a fake
//! repository root. The harness is pointed at `sh` as the program, so the
//! `backtesting` subcommand doubles as the script path relative to the
//! working directory and the remaining flags arrive as `"$@"`. No executable
//! bit is needed.
//!
//! Every run records its arguments and working directory next to the export
//! file, optionally writes a results report (plus a `.meta.json` sidecar),
//! prints to both streams and exits with the configured code.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use btharness_core::ToolConfig;
use tempfile::TempDir;

pub const STRATEGY: &str = "NostalgiaForInfinityNext";
pub const RESULTS_NAME: &str = "backtest-results-2021-02-01_12-00-00.json";
pub const STDOUT_LINE: &str = "BACKTESTING REPORT";
pub const STDERR_LINE: &str = "stub warning";

/// A fake repository root holding the stub tool and optional data fixtures.
pub struct StubRepo {
    pub root: TempDir,
}

pub struct StubBehaviour {
    pub report: Option<String>,
    pub exit_code: i32,
}

impl StubRepo {
    pub fn new(behaviour: StubBehaviour) -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("backtesting"), script(&behaviour)).unwrap();
        Self { root }
    }

    pub fn reporting(wins: u64, trades: u64, max_drawdown: f64) -> Self {
        Self::new(StubBehaviour {
            report: Some(report_json(wins, trades, max_drawdown)),
            exit_code: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn tool(&self) -> ToolConfig {
        ToolConfig {
            program: "sh".into(),
            strategy: STRATEGY.into(),
            repo_root: self.path().to_path_buf(),
            user_data: PathBuf::from("user_data"),
        }
    }

    /// `user_data/data` under the fake root.
    pub fn data_dir(&self) -> PathBuf {
        self.path().join("user_data/data")
    }

    /// Drop a compressed candle file so the data check passes for `exchange`.
    pub fn add_exchange_data(&self, exchange: &str) {
        let dir = self.data_dir().join(exchange);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("BTC_USDT-5m.json.gz"), b"\x1f\x8b").unwrap();
    }
}

/// Arguments the stub received, one per line (the `backtesting` subcommand excluded).
pub fn recorded_args(scratch: &Path) -> Vec<String> {
    std::fs::read_to_string(scratch.join("invocation-args.txt"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn recorded_cwd(scratch: &Path) -> PathBuf {
    PathBuf::from(
        std::fs::read_to_string(scratch.join("invocation-cwd.txt"))
            .unwrap()
            .trim(),
    )
}

pub fn report_json(wins: u64, trades: u64, max_drawdown: f64) -> String {
    serde_json::json!({
        "strategy_comparison": [{
            "key": STRATEGY,
            "trades": trades,
            "wins": wins,
            "draws": 0,
            "losses": trades - wins,
            "profit_total_pct": 42.0
        }],
        "strategy": {
            STRATEGY: {
                "max_drawdown": max_drawdown,
                "total_trades": trades,
                "stake_currency": "USDT",
                "pairlist": ["BTC/USDT", "ETH/USDT"]
            }
        }
    })
    .to_string()
}

fn script(behaviour: &StubBehaviour) -> String {
    let mut s = String::from(
        r#"export_file=""
for arg in "$@"; do
  case "$arg" in
    --export-filename=*) export_file="${arg#--export-filename=}" ;;
  esac
done
out_dir=$(dirname "$export_file")
mkdir -p "$out_dir"
printf '%s\n' "$@" > "$out_dir/invocation-args.txt"
pwd > "$out_dir/invocation-cwd.txt"
"#,
    );
    if let Some(report) = &behaviour.report {
        s.push_str(&format!(
            "cat > \"$out_dir/{RESULTS_NAME}\" <<'REPORT_EOF'\n{report}\nREPORT_EOF\n"
        ));
        s.push_str(&format!(
            "echo '{{}}' > \"$out_dir/{}\"\n",
            RESULTS_NAME.replace(".json", ".meta.json")
        ));
    }
    s.push_str(&format!(
        "echo '{STDOUT_LINE}'\necho '{STDERR_LINE}' >&2\nexit {}\n",
        behaviour.exit_code
    ));
    s
}

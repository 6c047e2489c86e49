//! btharness runner — drives the external backtesting tool.
//!
//! This crate builds on `btharness-core` to provide:
//! - `Backtest`: subprocess execution, results-file discovery, report normalization
//! - Artifact copies of results and captured stdout
//! - The per-exchange historical-data precondition
//! - The exchange × timerange scenario matrix with threshold evaluation
//! - Process-wide tracing setup

pub mod artifacts;
pub mod data_check;
pub mod logging;
pub mod matrix;
pub mod runner;

pub use artifacts::{ArtifactDir, SavedArtifacts};
pub use data_check::{check_exchange_data, DataCheckError};
pub use logging::{init_logging, LogFormat};
pub use matrix::{
    evaluate, run_matrix, CaseReport, CaseStatus, MatrixReport, ScenarioCase, ScenarioMatrix,
    Violation,
};
pub use runner::{
    find_results_files, locate_results_file, Backtest, BacktestExecutor, RunError,
};

//! Scenario matrix driven through the real subprocess runner.
//!
//! The stub tool returns the same report for every case, so each test
//! controls pass/fail through the report and the exchange thresholds.

#![cfg(unix)]

mod common;

use btharness_core::{Exchange, RunDefaults, Timerange};
use btharness_runner::{run_matrix, Backtest, CaseStatus, ScenarioCase, ScenarioMatrix};
use common::StubRepo;

fn timeranges() -> Vec<Timerange> {
    Timerange::monthly("20210101", 2).unwrap()
}

fn fresh_scratch(_: &ScenarioCase) -> std::io::Result<tempfile::TempDir> {
    tempfile::tempdir()
}

#[test]
fn report_within_thresholds_passes_every_case() {
    // GIVEN binance held to 90% win-rate and 30% drawdown, with data present
    let repo = StubRepo::reporting(95, 100, 0.25);
    repo.add_exchange_data("binance");
    let matrix = ScenarioMatrix::new(vec![Exchange::new("binance", 90.0, 30.0)], timeranges());

    // WHEN the matrix runs
    let report = run_matrix(
        &Backtest::new(repo.tool()),
        &matrix,
        &repo.data_dir(),
        &RunDefaults::default(),
        fresh_scratch,
    );

    // THEN both months pass with 95% / 25%
    assert_eq!(report.cases.len(), 2);
    assert!(report.all_passed(), "{report:#?}");
    let first = report.get("binance-20210101-20210201").unwrap();
    match &first.status {
        CaseStatus::Passed { stats } => {
            assert_eq!(stats.winrate, 95.0);
            assert_eq!(stats.max_drawdown, 25.0);
        }
        other => panic!("expected pass, got {other:?}"),
    }
}

#[test]
fn low_winrate_fails_with_threshold_message() {
    let repo = StubRepo::reporting(80, 100, 0.25);
    repo.add_exchange_data("binance");
    let matrix = ScenarioMatrix::new(vec![Exchange::new("binance", 90.0, 30.0)], timeranges());

    let report = run_matrix(
        &Backtest::new(repo.tool()),
        &matrix,
        &repo.data_dir(),
        &RunDefaults::default(),
        fresh_scratch,
    );

    assert_eq!(report.failed(), 2);
    for case in &report.cases {
        assert!(matches!(case.status, CaseStatus::ThresholdViolation { .. }));
        assert!(case
            .status
            .to_string()
            .contains("winrate 80.00% is below the 90.00% floor"));
    }
}

#[test]
fn exchange_without_data_is_failed_up_front() {
    let repo = StubRepo::reporting(95, 100, 0.25);
    repo.add_exchange_data("binance");
    let matrix = ScenarioMatrix::new(
        vec![
            Exchange::new("binance", 90.0, 30.0),
            Exchange::new("kucoin", 90.0, 30.0),
        ],
        timeranges(),
    );

    let report = run_matrix(
        &Backtest::new(repo.tool()),
        &matrix,
        &repo.data_dir(),
        &RunDefaults::default(),
        fresh_scratch,
    );

    assert_eq!(report.cases.len(), 4);
    assert_eq!(report.passed(), 2);
    for case in report.cases.iter().filter(|c| c.exchange == "kucoin") {
        assert!(matches!(case.status, CaseStatus::DataMissing { .. }));
    }
}

#[test]
fn missing_results_file_surfaces_as_case_error() {
    let repo = StubRepo::new(common::StubBehaviour {
        report: None,
        exit_code: 0,
    });
    repo.add_exchange_data("binance");
    let matrix = ScenarioMatrix::new(
        vec![Exchange::new("binance", 90.0, 30.0)],
        vec![Timerange::new("20210101", "20210201").unwrap()],
    );

    let report = run_matrix(
        &Backtest::new(repo.tool()),
        &matrix,
        &repo.data_dir(),
        &RunDefaults::default(),
        fresh_scratch,
    );

    match &report.cases[0].status {
        CaseStatus::Errored { message } => assert!(message.contains("backtest-results-")),
        other => panic!("expected error, got {other:?}"),
    }
}

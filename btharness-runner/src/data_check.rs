//! Historical-data precondition.
//!
//! Every backtest for an exchange reads candles from
//! `<data_dir>/<exchange>/**/*.json.gz`. When that tree is missing or holds
//! no compressed data files, every scenario for the exchange would fail
//! after a full tool run, so the matrix checks once per exchange and fails
//! the whole group up front.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

const FETCH_HINT: &str = "Make sure the repository submodule is init/update. \
                          Check the repository README.md for more information.";

#[derive(Debug, Error)]
pub enum DataCheckError {
    #[error("There's no exchange data for {exchange} ({dir} is not a directory). {hint}", hint = FETCH_HINT)]
    MissingDirectory { exchange: String, dir: PathBuf },

    #[error("There's no exchange data for {exchange} (no *.json.gz under {dir}). {hint}", hint = FETCH_HINT)]
    NoDataFiles { exchange: String, dir: PathBuf },
}

/// Count `*.json.gz` files under `<data_dir>/<exchange>`; zero is an error.
pub fn check_exchange_data(data_dir: &Path, exchange: &str) -> Result<usize, DataCheckError> {
    let dir = data_dir.join(exchange);
    if !dir.is_dir() {
        return Err(DataCheckError::MissingDirectory {
            exchange: exchange.to_string(),
            dir,
        });
    }

    let count = WalkDir::new(&dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".json.gz"))
        .count();

    if count == 0 {
        return Err(DataCheckError::NoDataFiles {
            exchange: exchange.to_string(),
            dir,
        });
    }
    Ok(count)
}

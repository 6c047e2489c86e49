//! Post-run artifacts for inspection outside the test report.
//!
//! For every successful run the raw results JSON is copied into the
//! artifact directory under its original file name, and the captured
//! stdout is written next to it with a `.txt` extension.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Paths written by [`ArtifactDir::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifacts {
    pub results_json: PathBuf,
    pub stdout_txt: PathBuf,
}

/// Directory receiving copies of results files and tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    /// Use `root` as the artifact directory, creating it if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create artifact directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy `results_file` here and write `stdout` to `<same stem>.txt`.
    pub fn save(&self, results_file: &Path, stdout: &str) -> Result<SavedArtifacts> {
        let file_name = results_file
            .file_name()
            .with_context(|| format!("results path has no file name: {}", results_file.display()))?;
        let results_json = self.root.join(file_name);
        std::fs::copy(results_file, &results_json).with_context(|| {
            format!(
                "failed to copy {} to {}",
                results_file.display(),
                results_json.display()
            )
        })?;

        let stdout_txt = results_json.with_extension("txt");
        std::fs::write(&stdout_txt, stdout.trim())
            .with_context(|| format!("failed to write {}", stdout_txt.display()))?;

        Ok(SavedArtifacts {
            results_json,
            stdout_txt,
        })
    }
}

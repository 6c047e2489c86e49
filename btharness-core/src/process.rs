//! Captured outcome of one external process run.

use std::fmt;
use std::process::Output;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("process exited without an exit code (terminated by a signal?)")]
    NoExitCode,
}

/// Exit code, both output streams and the command line of a finished process.
///
/// Streams are stored trimmed. `Display` renders the multi-line block logged
/// after every run and attached to failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    exitcode: i32,
    stdout: String,
    stderr: String,
    cmdline: Vec<String>,
}

impl ProcessResult {
    pub fn new(
        exitcode: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        cmdline: Vec<String>,
    ) -> Self {
        Self {
            exitcode,
            stdout: stdout.into().trim().to_string(),
            stderr: stderr.into().trim().to_string(),
            cmdline,
        }
    }

    /// Build from `std::process::Output`. Fails if the status carries no exit code.
    pub fn from_output(output: &Output, cmdline: Vec<String>) -> Result<Self, ProcessError> {
        let exitcode = output.status.code().ok_or(ProcessError::NoExitCode)?;
        Ok(Self::new(
            exitcode,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
            cmdline,
        ))
    }

    pub fn exitcode(&self) -> i32 {
        self.exitcode
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn cmdline(&self) -> &[String] {
        &self.cmdline
    }

    pub fn success(&self) -> bool {
        self.exitcode == 0
    }
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProcessResult")?;
        if !self.cmdline.is_empty() {
            write!(f, "\n Command Line: {:?}", self.cmdline)?;
        }
        write!(f, "\n Exitcode: {}", self.exitcode)?;
        if !self.stdout.is_empty() || !self.stderr.is_empty() {
            f.write_str("\n Process Output:")?;
        }
        if !self.stdout.is_empty() {
            write!(f, "\n   >>>>> STDOUT >>>>>\n{}\n   <<<<< STDOUT <<<<<", self.stdout)?;
        }
        if !self.stderr.is_empty() {
            write!(f, "\n   >>>>> STDERR >>>>>\n{}\n   <<<<< STDERR <<<<<", self.stderr)?;
        }
        f.write_str("\n")
    }
}

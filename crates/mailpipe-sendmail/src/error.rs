//! Error types for delivery mechanism invocation.

use crate::output::Output;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for delivery mechanism invocation.
pub type Result<T> = std::result::Result<T, Error>;

/// Delivery mechanism errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The executable could not be started (missing, not executable, ...).
    #[error("Failed to spawn {}: {source}", program.display())]
    Spawn {
        /// Executable that failed to start.
        program: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// I/O error while talking to the child process.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The child did not finish in time and was killed.
    #[error("Delivery mechanism timed out after {after:?}")]
    Timeout {
        /// Configured limit.
        after: Duration,
        /// Output captured before the child was killed.
        output: Output,
    },

    /// The child exited unsuccessfully.
    #[error(
        "Delivery mechanism exited with {}",
        output.exit_code.map_or_else(|| "a signal".to_string(), |code| format!("status {code}"))
    )]
    ExitStatus {
        /// Captured exit code and output.
        output: Output,
    },
}

impl Error {
    /// Returns the captured process output, when the process ran at all.
    #[must_use]
    pub const fn output(&self) -> Option<&Output> {
        match self {
            Self::Timeout { output, .. } | Self::ExitStatus { output } => Some(output),
            Self::Spawn { .. } | Self::Io(_) => None,
        }
    }

    /// Returns the exit code of a process that ran to completion.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitStatus { output } => output.exit_code,
            _ => None,
        }
    }
}

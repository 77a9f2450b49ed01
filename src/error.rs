//! Exit codes and pre-flight configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// Exit codes for the treesift binary.
///
/// - 0: Success (completed normally, even with per-file failures)
/// - 1: General error (bad dedup root, unexpected failure)
/// - 2: Configuration error (reconcile pre-flight checks failed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success: the run completed. Individual file failures are reported, not fatal.
    Success = 0,
    /// General error: an invalid dedup root or an unexpected failure.
    Failure = 1,
    /// Configuration error: invalid roots or illegal destination nesting.
    ConfigurationError = 2,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "TS000",
            Self::Failure => "TS001",
            Self::ConfigurationError => "TS002",
        }
    }
}

/// A configuration problem detected before any filesystem mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A root path does not exist.
    #[error("{label} folder does not exist: {path}")]
    RootMissing {
        /// Which root ("current", "older", "root")
        label: &'static str,
        /// The path as given
        path: PathBuf,
    },

    /// A root path exists but is not a directory.
    #[error("{label} folder is not a directory: {path}")]
    RootNotDirectory {
        /// Which root
        label: &'static str,
        /// The path as given
        path: PathBuf,
    },

    /// Current and older resolve to the same directory.
    #[error("current and older folders must differ: {0}")]
    IdenticalRoots(PathBuf),

    /// A destination would be written inside the current tree.
    #[error("{label} must not be inside the current folder: {path}")]
    DestinationInsideCurrent {
        /// Which destination
        label: &'static str,
        /// The destination path
        path: PathBuf,
    },

    /// A destination is the older folder itself.
    #[error("{label} must not be the older folder itself: {path}")]
    DestinationIsOlder {
        /// Which destination
        label: &'static str,
        /// The destination path
        path: PathBuf,
    },

    /// The quarantine directory name is unusable.
    #[error("invalid quarantine directory name {name:?}: {reason}")]
    InvalidQuarantine {
        /// The name as given
        name: String,
        /// What is wrong with it
        reason: &'static str,
    },
}
